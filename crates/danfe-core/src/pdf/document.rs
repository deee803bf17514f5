//! lopdf-backed source document with page snapshots.

use std::collections::BTreeSet;

use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::images::image_streams;
use super::render;
use super::text::{build_blocks, build_lines, get_number, TextInterpreter, TextSpan};
use super::{PageSource, Result};
use crate::error::PdfError;
use crate::models::page::Page;

/// US Letter, used when a page declares no media box.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Depth limit when walking `/Parent` links of the page tree.
const MAX_TREE_DEPTH: usize = 64;

/// An opened source PDF together with a snapshot of each of its pages.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    inner: Document,
    page_ids: Vec<ObjectId>,
    pages: Vec<Page>,
}

impl PdfDocument {
    /// Open a PDF from bytes.
    ///
    /// Documents encrypted with an empty user password are decrypted
    /// transparently. A document without pages is rejected.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        Self::from_document(doc)
    }

    /// Snapshot every page of an already parsed document.
    pub fn from_document(doc: Document) -> Result<Self> {
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PdfError::NoPages);
        }

        let pages = page_ids
            .iter()
            .enumerate()
            .map(|(index, &id)| snapshot_page(&doc, index, id))
            .collect::<Vec<_>>();

        debug!("Loaded PDF with {} pages", pages.len());
        Ok(Self {
            inner: doc,
            page_ids,
            pages,
        })
    }

    /// Page snapshots in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Underlying lopdf document.
    pub fn document(&self) -> &Document {
        &self.inner
    }

    /// Build a copy of this document without the given pages (0-based).
    ///
    /// Retained pages keep their relative order and are re-indexed.
    pub fn without_pages(&self, drop: &BTreeSet<usize>) -> Result<PdfDocument> {
        if drop.len() >= self.pages.len() {
            return Err(PdfError::NoPages);
        }

        let mut doc = self.inner.clone();
        let numbers: Vec<u32> = drop.iter().map(|&i| i as u32 + 1).collect();
        doc.delete_pages(&numbers);
        doc.prune_objects();

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let pages: Vec<Page> = self
            .pages
            .iter()
            .filter(|p| !drop.contains(&p.index))
            .enumerate()
            .map(|(index, page)| Page {
                index,
                ..page.clone()
            })
            .collect();

        if page_ids.len() != pages.len() {
            return Err(PdfError::Write(format!(
                "page tree has {} pages after removal, expected {}",
                page_ids.len(),
                pages.len()
            )));
        }

        Ok(PdfDocument {
            inner: doc,
            page_ids,
            pages,
        })
    }

    /// Serialize the document.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut doc = self.inner.clone();
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| PdfError::Write(e.to_string()))?;
        Ok(buffer)
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Render a page at `dpi`.
    ///
    /// Without a loadable pdfium library the page's placed images are
    /// composited onto a blank page of the same size instead.
    fn rasterize(&self, index: usize, dpi: u32) -> Result<DynamicImage> {
        if index >= self.pages.len() {
            return Err(PdfError::InvalidPage(index));
        }
        let data = self.to_bytes()?;

        match render::render_page(&data, index, dpi) {
            Err(PdfError::RendererUnavailable(reason)) => {
                debug!(page = index + 1, %reason, "Falling back to image compositing");
                let page_id = self.page_ids[index];
                let doc = &self.inner;
                render::composite_images(
                    doc,
                    page_id,
                    page_resources(doc, page_id),
                    media_box(doc, page_id),
                    index,
                    dpi,
                )
            }
            rendered => rendered,
        }
    }
}

/// Attribute of a page node, inherited from its ancestors when absent.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return doc.dereference(value).ok().map(|(_, o)| o);
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node = doc.get_dictionary(*parent_id).ok()?,
            _ => return None,
        }
    }
    None
}

/// Resources dictionary of a page, following `/Parent` inheritance.
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok())
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values: Vec<f32> = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().filter_map(get_number).collect())
        .unwrap_or_default();

    match values.as_slice() {
        [x0, y0, x1, y1] => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

fn snapshot_page(doc: &Document, index: usize, page_id: ObjectId) -> Page {
    let media_box = media_box(doc, page_id);
    let mut page = Page::new(
        index,
        media_box[2] - media_box[0],
        media_box[3] - media_box[1],
    );
    let resources = page_resources(doc, page_id);

    match read_page_text(doc, index, page_id, resources) {
        Ok(spans) => {
            let lines = build_lines(&spans, media_box);
            page.text = lines
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            page.blocks = build_blocks(&lines);
        }
        Err(e) => {
            warn!(page = index + 1, error = %e, "Could not read page content, treating it as empty");
        }
    }

    page.image_count = resources.map_or(0, |r| image_streams(doc, r).len());

    trace!(
        page = index + 1,
        blocks = page.blocks.len(),
        images = page.image_count,
        "Page snapshot"
    );
    page
}

fn read_page_text<'a>(
    doc: &'a Document,
    index: usize,
    page_id: ObjectId,
    resources: Option<&'a Dictionary>,
) -> Result<Vec<TextSpan>> {
    let page_number = index + 1;
    let content = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::Content {
            page: page_number,
            reason: e.to_string(),
        })?;

    TextInterpreter::new(doc)
        .run(&content, resources)
        .map(|interpretation| interpretation.spans)
        .map_err(|reason| PdfError::Content {
            page: page_number,
            reason,
        })
}
