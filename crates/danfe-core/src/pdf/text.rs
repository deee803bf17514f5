//! Content stream interpretation into positioned text lines and blocks.
//!
//! Only the operators that move or show text, and image `Do` placements, are
//! interpreted. Glyph boxes are
//! approximated from the font size (ascent 0.8, descent 0.2) and advance widths
//! from the font's width tables when present.

use std::collections::{BTreeMap, HashMap};

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::trace;

use crate::models::page::{BBox, TextBlock};

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustment (thousandths of an em) treated as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    pub(crate) const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub(crate) const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let n: Vec<f32> = operands.iter().take(6).filter_map(get_number).collect();
        (n.len() == 6).then(|| Self::new(n[0], n[1], n[2], n[3], n[4], n[5]))
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Bounds of the unit square mapped through this matrix.
    fn unit_square_bounds(&self) -> [f32; 4] {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        corners.iter().fold(
            [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY],
            |[x0, y0, x1, y1], &(x, y)| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
        )
    }
}

/// A run of text shown by a single text operator, in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextSpan {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub baseline: f32,
    pub size: f32,
}

/// A line of text in top-left page space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextLine {
    pub text: String,
    pub bbox: BBox,
}

/// Advance widths of a font, in thousandths of text space units.
#[derive(Debug, Clone, Default)]
struct FontMetrics {
    first_char: i64,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    missing_width: f32,
    two_byte: bool,
}

impl FontMetrics {
    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let two_byte = matches!(font.get(b"Subtype").and_then(Object::as_name), Ok(b"Type0"));

        if two_byte {
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| doc.dereference(o).ok())
                .and_then(|(_, o)| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| doc.dereference(o).ok())
                .and_then(|(_, o)| o.as_dict().ok());

            let mut metrics = FontMetrics {
                two_byte: true,
                missing_width: 1000.0,
                ..Default::default()
            };
            if let Some(cid_font) = descendant {
                if let Some(dw) = cid_font.get(b"DW").ok().and_then(get_number) {
                    metrics.missing_width = dw;
                }
                if let Some(w) = cid_font
                    .get(b"W")
                    .ok()
                    .and_then(|o| doc.dereference(o).ok())
                    .and_then(|(_, o)| o.as_array().ok())
                {
                    metrics.cid_widths = parse_cid_widths(doc, w);
                }
            }
            return metrics;
        }

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_array().ok())
            .map(|arr| arr.iter().map(|w| get_number(w).unwrap_or(0.0)).collect())
            .unwrap_or_default();

        FontMetrics {
            first_char,
            widths,
            cid_widths: HashMap::new(),
            missing_width: 500.0,
            two_byte: false,
        }
    }

    /// Character codes of a shown string.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| match c {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.missing_width);
        }
        let idx = i64::from(code) - self.first_char;
        if idx >= 0 {
            if let Some(w) = self.widths.get(idx as usize) {
                if *w > 0.0 {
                    return *w;
                }
            }
        }
        self.missing_width
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(start) = get_number(&w[i]) else {
            i += 1;
            continue;
        };
        let start = start as u32;
        match w.get(i + 1).map(|o| doc.dereference(o).map(|(_, o)| o)) {
            Some(Ok(Object::Array(list))) => {
                for (offset, width) in list.iter().enumerate() {
                    let code = u32::try_from(offset).ok().and_then(|o| start.checked_add(o));
                    if let (Some(code), Some(width)) = (code, get_number(width)) {
                        widths.insert(code, width);
                    }
                }
                i += 2;
            }
            Some(Ok(end)) => {
                if let (Some(end), Some(width)) = (get_number(end), w.get(i + 2).and_then(get_number)) {
                    // CIDs are 16-bit; a wider range is malformed
                    let last = (end as u32).min(start.saturating_add(0xFFFF));
                    for code in start..=last {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            _ => break,
        }
    }
    widths
}

#[derive(Debug, Clone)]
struct TextState {
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// An image XObject drawn on the page, with its box in PDF user space
/// (`[x0, y0, x1, y1]`).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImagePlacement {
    pub id: ObjectId,
    pub bbox: [f32; 4],
}

/// What a content stream shows.
#[derive(Debug, Clone, Default)]
pub(crate) struct Interpretation {
    pub spans: Vec<TextSpan>,
    pub images: Vec<ImagePlacement>,
}

/// Walks content streams and collects the text spans and images they show.
pub(crate) struct TextInterpreter<'a> {
    doc: &'a Document,
    spans: Vec<TextSpan>,
    images: Vec<ImagePlacement>,
    metrics: HashMap<(usize, Vec<u8>), FontMetrics>,
}

impl<'a> TextInterpreter<'a> {
    pub(crate) fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            spans: Vec::new(),
            images: Vec::new(),
            metrics: HashMap::new(),
        }
    }

    /// Interpret a page content stream with the page resources.
    pub(crate) fn run(
        mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
    ) -> Result<Interpretation, String> {
        self.interpret(content, resources, Matrix::IDENTITY, 0)?;
        Ok(Interpretation {
            spans: self.spans,
            images: self.images,
        })
    }

    fn interpret(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        depth: usize,
    ) -> Result<(), String> {
        let content = Content::decode(content).map_err(|e| e.to_string())?;
        let fonts = resources.map(|r| fonts_in(self.doc, r)).unwrap_or_default();
        let scope = resources.map_or(0, |r| r as *const Dictionary as usize);

        let mut state = GraphicsState {
            ctm: base,
            text: TextState::default(),
        };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) =
                        (operands.first(), operands.get(1).and_then(get_number))
                    {
                        state.text.font = name.clone();
                        state.text.size = size;
                    }
                }
                "Tc" => {
                    if let Some(v) = operands.first().and_then(get_number) {
                        state.text.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = operands.first().and_then(get_number) {
                        state.text.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = operands.first().and_then(get_number) {
                        state.text.horizontal_scale = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(v) = operands.first().and_then(get_number) {
                        state.text.leading = v;
                    }
                }
                "Td" | "TD" => {
                    if let (Some(tx), Some(ty)) = (
                        operands.first().and_then(get_number),
                        operands.get(1).and_then(get_number),
                    ) {
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        tlm = Matrix::translation(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translation(0.0, -state.text.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&state, &mut tm, &fonts, scope, &[TjPart::Text(bytes)]);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        if let Some(v) = operands.first().and_then(get_number) {
                            state.text.word_spacing = v;
                        }
                        if let Some(v) = operands.get(1).and_then(get_number) {
                            state.text.char_spacing = v;
                        }
                    }
                    tlm = Matrix::translation(0.0, -state.text.leading).then(&tlm);
                    tm = tlm;
                    let idx = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Object::String(bytes, _)) = operands.get(idx) {
                        self.show(&state, &mut tm, &fonts, scope, &[TjPart::Text(bytes)]);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let parts: Vec<TjPart<'_>> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(TjPart::Text(bytes)),
                                other => get_number(other).map(TjPart::Adjust),
                            })
                            .collect();
                        self.show(&state, &mut tm, &fonts, scope, &parts);
                    }
                }
                "Do" => {
                    if let (Some(Object::Name(name)), Some(res)) = (operands.first(), resources) {
                        self.run_xobject(name, res, &state, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn run_xobject(
        &mut self,
        name: &[u8],
        resources: &'a Dictionary,
        state: &GraphicsState,
        depth: usize,
    ) -> Result<(), String> {
        let doc = self.doc;
        let Some((id, stream)) = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(id, o)| o.as_stream().ok().map(|s| (id, s)))
        else {
            return Ok(());
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => {
                if let Some(id) = id {
                    self.images.push(ImagePlacement {
                        id,
                        bbox: state.ctm.unit_square_bounds(),
                    });
                }
                return Ok(());
            }
            Ok(b"Form") if depth < MAX_FORM_DEPTH => {}
            Ok(b"Form") => {
                trace!("form nesting limit reached");
                return Ok(());
            }
            _ => return Ok(()),
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| Matrix::from_operands(arr))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_dict().ok())
            .or(Some(resources));
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        self.interpret(&content, form_resources, matrix.then(&state.ctm), depth + 1)
    }

    fn show(
        &mut self,
        state: &GraphicsState,
        tm: &mut Matrix,
        fonts: &BTreeMap<Vec<u8>, &'a Dictionary>,
        scope: usize,
        parts: &[TjPart<'_>],
    ) {
        let doc = self.doc;
        let ts = &state.text;
        let font = fonts.get(&ts.font).copied();
        let metrics = self
            .metrics
            .entry((scope, ts.font.clone()))
            .or_insert_with(|| font.map(|f| FontMetrics::from_dict(doc, f)).unwrap_or_default())
            .clone();

        let start = tm.then(&state.ctm);
        let mut text = String::new();

        for part in parts {
            match part {
                TjPart::Text(bytes) => {
                    text.push_str(&decode_with_font(doc, font, bytes));
                    let mut advance = 0.0;
                    for code in metrics.codes(bytes) {
                        advance += metrics.width(code) / 1000.0 * ts.size + ts.char_spacing;
                        if code == 32 && !metrics.two_byte {
                            advance += ts.word_spacing;
                        }
                    }
                    *tm = Matrix::translation(advance * ts.horizontal_scale, 0.0).then(tm);
                }
                TjPart::Adjust(n) => {
                    let shift = -n / 1000.0 * ts.size * ts.horizontal_scale;
                    *tm = Matrix::translation(shift, 0.0).then(tm);
                    if -n > TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }

        if text.trim().is_empty() {
            return;
        }

        let end = tm.then(&state.ctm);
        let (sx, sy) = start.apply(0.0, 0.0);
        let (ex, _) = end.apply(0.0, 0.0);
        let size = (ts.size * start.vertical_scale()).abs().max(1.0);

        self.spans.push(TextSpan {
            text,
            x0: sx.min(ex),
            x1: sx.max(ex),
            baseline: sy,
            size,
        });
    }
}

enum TjPart<'b> {
    Text(&'b [u8]),
    Adjust(f32),
}

/// Font dictionaries of a resource dictionary, keyed by resource name.
fn fonts_in<'a>(doc: &'a Document, resources: &'a Dictionary) -> BTreeMap<Vec<u8>, &'a Dictionary> {
    let mut fonts = BTreeMap::new();
    let Some(font_dict) = resources
        .get(b"Font")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_dict().ok())
    else {
        return fonts;
    };

    for (name, value) in font_dict.iter() {
        if let Ok((_, Object::Dictionary(font))) = doc.dereference(value) {
            fonts.insert(name.clone(), font);
        }
    }
    fonts
}

fn decode_with_font(doc: &Document, font: Option<&Dictionary>, bytes: &[u8]) -> String {
    if let Some(font) = font {
        if let Ok(encoding) = font.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }
    }
    decode_text_simple(bytes)
}

/// Decoding fallback when the font gives no usable encoding.
pub(crate) fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Group spans into lines, in content order, converting to top-left page space.
///
/// `media_box` is `[x0, y0, x1, y1]` of the page in user space.
pub(crate) fn build_lines(spans: &[TextSpan], media_box: [f32; 4]) -> Vec<TextLine> {
    let [mx0, _, _, my1] = media_box;
    let mut lines: Vec<(TextLine, f32, f32)> = Vec::new();

    for span in spans {
        let bbox = BBox::new(
            span.x0 - mx0,
            my1 - (span.baseline + ASCENT * span.size),
            span.x1 - mx0,
            my1 - (span.baseline - DESCENT * span.size),
        );

        if let Some((line, baseline, size)) = lines.last_mut() {
            let tolerance = 0.5 * size.min(span.size);
            let same_baseline = (span.baseline - *baseline).abs() <= tolerance;
            let moves_forward = bbox.x0 >= line.bbox.x1 - 0.5 * *size;
            if same_baseline && moves_forward {
                let gap = bbox.x0 - line.bbox.x1;
                if gap > 0.15 * span.size
                    && !line.text.ends_with(char::is_whitespace)
                    && !span.text.starts_with(char::is_whitespace)
                {
                    line.text.push(' ');
                }
                line.text.push_str(&span.text);
                line.bbox = line.bbox.union(&bbox);
                *size = size.max(span.size);
                continue;
            }
        }

        lines.push((
            TextLine {
                text: span.text.clone(),
                bbox,
            },
            span.baseline,
            span.size,
        ));
    }

    lines
        .into_iter()
        .map(|(mut line, _, _)| {
            line.text = line.text.trim().to_string();
            line
        })
        .filter(|line| !line.text.is_empty())
        .collect()
}

/// Merge consecutive lines into blocks when they are vertically adjacent
/// and horizontally overlapping.
pub(crate) fn build_blocks(lines: &[TextLine]) -> Vec<TextBlock> {
    let mut blocks: Vec<(BBox, Vec<&str>, BBox)> = Vec::new();

    for line in lines {
        if let Some((bbox, texts, last)) = blocks.last_mut() {
            let line_height = line.bbox.height().max(last.height()).max(1.0);
            let gap = line.bbox.y0 - last.y1;
            if gap >= -0.5 * line_height
                && gap <= 0.6 * line_height
                && line.bbox.overlaps_horizontally(bbox)
            {
                *bbox = bbox.union(&line.bbox);
                texts.push(&line.text);
                *last = line.bbox;
                continue;
            }
        }
        blocks.push((line.bbox, vec![&line.text], line.bbox));
    }

    blocks
        .into_iter()
        .map(|(bbox, texts, _)| TextBlock::new(bbox, texts.join("\n")))
        .collect()
}
