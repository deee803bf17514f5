//! Page content builder and output document writer.
//!
//! Coordinates are PDF user space: origin at the bottom-left corner, `y`
//! growing upwards, one unit per point.

use chrono::Local;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::{ComposeError, PdfError};

/// One centimetre in points.
pub const CM: f32 = 28.346_457;

/// Identity-free rotation by 90° counter-clockwise, translated to `(tx, ty)`.
pub fn rotated_90(tx: f32, ty: f32) -> [f32; 6] {
    [0.0, 1.0, -1.0, 0.0, tx, ty]
}

/// Standard fonts available on every output page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    const ALL: [Font; 2] = [Font::Helvetica, Font::HelveticaBold];

    fn resource_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }

    fn base_font(&self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Approximate advance of a character, in thousandths of the font size.
    fn advance(&self, c: char) -> f32 {
        let bold = matches!(self, Font::HelveticaBold);
        match c {
            ' ' => 278.0,
            '0'..='9' => 556.0,
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => {
                if bold { 278.0 } else { 222.0 }
            }
            'f' | 't' | 'r' | '(' | ')' | '-' | 'I' | '/' => 333.0,
            'm' | 'w' => if bold { 889.0 } else { 833.0 },
            'M' | 'W' => 833.0,
            c if c.is_uppercase() => if bold { 722.0 } else { 667.0 },
            _ => if bold { 611.0 } else { 556.0 },
        }
    }

    /// Approximate width of `text` at `size`.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.advance(c)).sum::<f32>() * size / 1000.0
    }
}

/// Encode text for a font using WinAnsiEncoding. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => win_ansi_special(c).unwrap_or(b'?'),
        })
        .collect()
}

fn win_ansi_special(c: char) -> Option<u8> {
    Some(match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    })
}

/// A JPEG image to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

/// Drawing operations of one output page.
#[derive(Debug, Clone)]
pub struct PageCanvas {
    width: f32,
    height: f32,
    operations: Vec<Operation>,
    images: Vec<EmbeddedImage>,
}

impl PageCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            operations: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn save_state(&mut self) {
        self.operations.push(Operation::new("q", vec![]));
    }

    pub fn restore_state(&mut self) {
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Concatenate a matrix to the current transformation.
    pub fn transform(&mut self, m: [f32; 6]) {
        self.operations
            .push(Operation::new("cm", m.iter().copied().map(real).collect()));
    }

    /// Fill a black rectangle.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.operations.push(Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]));
        self.operations
            .push(Operation::new("re", vec![real(x), real(y), real(w), real(h)]));
        self.operations.push(Operation::new("f", vec![]));
    }

    /// Stroke a rectangle outline.
    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, line_width: f32) {
        self.operations.push(Operation::new("w", vec![real(line_width)]));
        self.operations.push(Operation::new("RG", vec![real(0.0), real(0.0), real(0.0)]));
        self.operations
            .push(Operation::new("re", vec![real(x), real(y), real(w), real(h)]));
        self.operations.push(Operation::new("S", vec![]));
    }

    /// Show a single line of text with the given text matrix.
    pub fn text(&mut self, font: Font, size: f32, matrix: [f32; 6], text: &str) {
        self.operations.push(Operation::new("BT", vec![]));
        self.operations.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().as_bytes().to_vec()), real(size)],
        ));
        self.operations.push(Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]));
        self.operations
            .push(Operation::new("Tm", matrix.iter().copied().map(real).collect()));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ));
        self.operations.push(Operation::new("ET", vec![]));
    }

    /// Show a line of text with its baseline starting at `(x, y)`.
    pub fn text_at(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        self.text(font, size, [1.0, 0.0, 0.0, 1.0, x, y], text);
    }

    /// Draw an image into the box with lower-left corner `(x, y)`.
    pub fn image(&mut self, image: EmbeddedImage, x: f32, y: f32, w: f32, h: f32) {
        let name = format!("Im{}", self.images.len());
        self.images.push(image);
        self.save_state();
        self.transform([w, 0.0, 0.0, h, x, y]);
        self.operations
            .push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        self.restore_state();
    }

    /// Encode the content stream. Nothing is written to a document yet.
    pub fn finish(self) -> Result<FinishedPage, ComposeError> {
        let content = Content {
            operations: self.operations,
        }
        .encode()
        .map_err(|e| ComposeError::Encoding(e.to_string()))?;

        Ok(FinishedPage {
            width: self.width,
            height: self.height,
            content,
            images: self.images,
        })
    }
}

/// An encoded page ready to be committed to an [`OutputDocument`].
#[derive(Debug, Clone)]
pub struct FinishedPage {
    width: f32,
    height: f32,
    content: Vec<u8>,
    images: Vec<EmbeddedImage>,
}

/// The generated PDF, assembled page by page.
#[derive(Debug)]
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    fonts: Dictionary,
    kids: Vec<Object>,
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = Dictionary::new();
        for font in Font::ALL {
            let id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(font.resource_name(), id);
        }

        Self {
            doc,
            pages_id,
            fonts,
            kids: Vec::new(),
        }
    }

    /// Number of committed pages.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Commit an encoded page.
    pub fn add_page(&mut self, page: FinishedPage) {
        let mut xobjects = Dictionary::new();
        for (i, image) in page.images.into_iter().enumerate() {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8i64,
                    "Filter" => "DCTDecode",
                },
                image.jpeg,
            )
            .with_compression(false);
            let id = self.doc.add_object(stream);
            xobjects.set(format!("Im{i}"), id);
        }

        let content_id = self.doc.add_object(Stream::new(dictionary! {}, page.content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(page.width), real(page.height)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => self.fonts.clone(),
                "XObject" => xobjects,
            },
        });
        self.kids.push(page_id.into());
    }

    /// Write the page tree, catalog and metadata and serialize the document.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfError> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let creation_date = Local::now().format("D:%Y%m%d%H%M%S").to_string();
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(concat!("danfe ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(creation_date),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Write(e.to_string()))?;
        Ok(buffer)
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}
