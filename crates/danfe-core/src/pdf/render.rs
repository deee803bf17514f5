//! Page rasterization.
//!
//! Pages are rendered with pdfium. When the pdfium library cannot be bound,
//! the page is approximated by compositing its placed images onto a blank
//! page-sized raster.

use std::sync::Once;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfium_render::prelude::{PdfRenderConfig, Pdfium, PdfiumError};
use tracing::{debug, trace, warn};

use super::images::decode_image;
use super::text::TextInterpreter;
use super::Result;
use crate::error::PdfError;

/// Placed images larger than this many page sizes are skipped.
const MAX_IMAGE_PAGE_RATIO: f32 = 4.0;

static FALLBACK_NOTICE: Once = Once::new();

/// Pixel size of a page box at `dpi`.
pub(crate) fn raster_size(width_pt: f32, height_pt: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    (
        (width_pt * scale).round().max(1.0) as u32,
        (height_pt * scale).round().max(1.0) as u32,
    )
}

fn bind_pdfium() -> std::result::Result<Pdfium, PdfiumError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())?;
    Ok(Pdfium::new(bindings))
}

/// Render page `index` of a serialized document with pdfium.
///
/// Fails with [`PdfError::RendererUnavailable`] when the pdfium library
/// cannot be loaded.
pub(crate) fn render_page(data: &[u8], index: usize, dpi: u32) -> Result<DynamicImage> {
    let page_number = index + 1;
    let render_error = |e: PdfiumError| PdfError::Render {
        page: page_number,
        reason: format!("{:?}", e),
    };

    let pdfium = bind_pdfium().map_err(|e| PdfError::RendererUnavailable(format!("{:?}", e)))?;
    let document = pdfium.load_pdf_from_byte_slice(data, None).map_err(render_error)?;

    let page_index = u16::try_from(index).map_err(|_| PdfError::InvalidPage(index))?;
    let page = document.pages().get(page_index).map_err(render_error)?;

    let (width, height) = raster_size(page.width().value, page.height().value, dpi);
    let config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_maximum_height(height as i32)
        .render_form_data(true)
        .render_annotations(true);

    let image = page.render_with_config(&config).map_err(render_error)?.as_image();
    debug!(
        page = page_number,
        width = image.width(),
        height = image.height(),
        "Rendered page"
    );
    Ok(image)
}

/// Page raster built from the images drawn on the page, each scaled into its
/// placement box. Text and vector content are not drawn.
pub(crate) fn composite_images(
    doc: &Document,
    page_id: ObjectId,
    resources: Option<&Dictionary>,
    media_box: [f32; 4],
    index: usize,
    dpi: u32,
) -> Result<DynamicImage> {
    let page_number = index + 1;
    FALLBACK_NOTICE.call_once(|| {
        warn!("pdfium is not available, artwork pages are approximated from their images");
    });

    let [mx0, my0, mx1, my1] = media_box;
    let scale = dpi as f32 / 72.0;
    let (width, height) = raster_size(mx1 - mx0, my1 - my0, dpi);
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    let content = doc.get_page_content(page_id).map_err(|e| PdfError::Content {
        page: page_number,
        reason: e.to_string(),
    })?;
    let placements = TextInterpreter::new(doc)
        .run(&content, resources)
        .map_err(|reason| PdfError::Content {
            page: page_number,
            reason,
        })?
        .images;

    let mut drawn = 0;
    let mut last_error = None;
    for placement in &placements {
        let [x0, y0, x1, y1] = placement.bbox;
        let box_w = ((x1 - x0) * scale).round();
        let box_h = ((y1 - y0) * scale).round();
        if !(box_w >= 1.0 && box_h >= 1.0)
            || box_w > width as f32 * MAX_IMAGE_PAGE_RATIO
            || box_h > height as f32 * MAX_IMAGE_PAGE_RATIO
        {
            trace!(page = page_number, bbox = ?placement.bbox, "Skipping image placement");
            continue;
        }

        let Ok(stream) = doc.get_object(placement.id).and_then(Object::as_stream) else {
            continue;
        };
        let image = match decode_image(doc, stream) {
            Ok(image) => image,
            Err(e) => {
                warn!(page = page_number, error = %e, "Could not decode placed image");
                last_error = Some(e);
                continue;
            }
        };

        let scaled = image
            .resize_exact(box_w as u32, box_h as u32, FilterType::Triangle)
            .to_rgba8();
        let left = ((x0 - mx0) * scale).round() as i64;
        let top = ((my1 - y1) * scale).round() as i64;
        imageops::overlay(&mut canvas, &scaled, left, top);
        drawn += 1;
    }

    // Nothing could be drawn from images that were there
    if let (0, Some(e)) = (drawn, last_error) {
        return Err(e);
    }

    debug!(page = page_number, images = drawn, width, height, "Composited page images");
    Ok(DynamicImage::ImageRgba8(canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raster_size_follows_dpi() {
        assert_eq!(raster_size(595.0, 842.0, 72), (595, 842));
        assert_eq!(raster_size(595.0, 842.0, 200), (1653, 2339));
        assert_eq!(raster_size(0.0, 0.0, 200), (1, 1));
    }
}
