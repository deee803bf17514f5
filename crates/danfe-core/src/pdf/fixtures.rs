//! In-memory PDF builders for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

/// Text size used by fixture lines.
pub(crate) const FIXTURE_FONT_SIZE: f32 = 10.0;

/// One page of a fixture document (A4, 595×842).
#[derive(Debug, Clone, Default)]
pub(crate) struct FixturePage {
    lines: Vec<(f32, f32, String)>,
    image: Option<(u32, u32)>,
}

impl FixturePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a text line with its baseline at `(x, y)` in PDF user space.
    pub(crate) fn line(mut self, x: f32, y: f32, text: &str) -> Self {
        self.lines.push((x, y, text.to_string()));
        self
    }

    /// Add an RGB image of `width`×`height` pixels drawn over most of the page.
    pub(crate) fn image(mut self, width: u32, height: u32) -> Self {
        self.image = Some((width, height));
        self
    }
}

/// Latin-1 bytes of a string, matching WinAnsiEncoding for the characters tests use.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c as u32 as u8 } else { b'?' })
        .collect()
}

pub(crate) fn build_pdf(pages: &[FixturePage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let mut operations = Vec::new();
        let mut xobjects = lopdf::Dictionary::new();

        if let Some((width, height)) = page.image {
            let pixels: Vec<u8> = (0..width * height)
                .flat_map(|i| [(i * 40 % 256) as u8, 120, 200])
                .collect();
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8i64,
                },
                pixels,
            ));
            xobjects.set("Im0", image_id);
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![300.into(), 0.into(), 0.into(), 300.into(), 50.into(), 400.into()],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]));
            operations.push(Operation::new("Q", vec![]));
        }

        for (x, y, text) in &page.lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Real(FIXTURE_FONT_SIZE)],
            ));
            operations.push(Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), Object::Real(*x), Object::Real(*y)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(latin1(text), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap_or_default(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
