//! Label sheet fixtures built in memory with lopdf.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

pub const VALID_KEY: &str = "35240612345678000190550010000123451234567891";

/// One A4 page: text lines and an optional RGB image.
#[derive(Debug, Clone, Default)]
pub struct SheetPage {
    lines: Vec<(f32, f32, String)>,
    image: Option<(u32, u32)>,
}

impl SheetPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text line with its baseline at `(x, y)`, bottom-left origin.
    pub fn line(mut self, x: f32, y: f32, text: &str) -> Self {
        self.lines.push((x, y, text.to_string()));
        self
    }

    /// Consecutive lines starting at `y`, 15pt apart.
    pub fn lines(mut self, y: f32, texts: &[&str]) -> Self {
        for (i, text) in texts.iter().enumerate() {
            self = self.line(40.0, y - 15.0 * i as f32, text);
        }
        self
    }

    pub fn image(mut self, width: u32, height: u32) -> Self {
        self.image = Some((width, height));
        self
    }
}

/// A DANFE page carrying `key` and one `(code, description, quantity)` per item.
pub fn danfe_page(key: &str, items: &[(&str, &str, &str)]) -> SheetPage {
    let mut lines = vec![
        "DANFE".to_string(),
        "DOCUMENTO AUXILIAR DA NOTA FISCAL ELETRONICA".to_string(),
        "CHAVE DE ACESSO".to_string(),
        key.to_string(),
        "ITEM".to_string(),
    ];
    for (i, (code, description, quantity)) in items.iter().enumerate() {
        lines.push(format!("{:02}", i + 1));
        lines.push(format!("{code} {description}"));
        lines.push("QUANT.".to_string());
        lines.push(quantity.to_string());
    }
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    SheetPage::new().lines(800.0, &refs)
}

/// A page holding only label artwork.
pub fn label_page() -> SheetPage {
    SheetPage::new().image(60, 40)
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c as u32 as u8 } else { b'?' })
        .collect()
}

pub fn build_sheet(pages: &[SheetPage]) -> Vec<u8> {
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
        let mut xobjects = Dictionary::new();

        if let Some((width, height)) = page.image {
            let pixels: Vec<u8> = (0..width * height)
                .flat_map(|i| [(i % 256) as u8, 90, 30])
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
            xobjects.set("Art", image_id);
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![400.into(), 0.into(), 0.into(), 300.into(), 90.into(), 300.into()],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(b"Art".to_vec())]));
            operations.push(Operation::new("Q", vec![]));
        }

        for (x, y, text) in &page.lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Real(10.0)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(*x), Object::Real(*y)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(latin1(text), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
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
