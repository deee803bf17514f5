//! Selection and preparation of the label artwork shown above the table.

use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use super::canvas::EmbeddedImage;
use crate::error::{ComposeError, PdfError};
use crate::models::page::Page;
use crate::pdf::PageSource;

/// Candidate page indices for the record at `record_index`.
///
/// Records are assumed to occupy two pages each; the window also looks one
/// page past the pair.
pub fn artwork_window(record_index: usize, page_count: usize) -> impl Iterator<Item = usize> {
    let start = 2 * record_index;
    (start..start + 3).filter(move |&p| p < page_count)
}

/// A page with images that is not itself a DANFE page.
pub fn is_artwork_page(page: &Page) -> bool {
    let text = page.text.to_uppercase();
    page.has_images() && !(text.contains("DANFE") && text.contains("CHAVE DE ACESSO"))
}

/// First artwork page in the window of a record.
pub fn find_artwork_page<S: PageSource + ?Sized>(source: &S, record_index: usize) -> Option<usize> {
    artwork_window(record_index, source.page_count())
        .find(|&p| source.page(p).is_some_and(is_artwork_page))
}

/// Rasterize a source page and encode it as JPEG.
pub fn prepare_artwork<S: PageSource + ?Sized>(
    source: &S,
    page: usize,
    dpi: u32,
    quality: u8,
) -> Result<EmbeddedImage, ComposeError> {
    let raster = source.rasterize(page, dpi)?;
    let rgb = raster.to_rgb8();
    let (width, height) = (rgb.width(), rgb.height());
    if width == 0 || height == 0 {
        return Err(PdfError::ImageExtraction(format!("page {} rendered empty", page + 1)).into());
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .map_err(|e| PdfError::ImageExtraction(e.to_string()))?;

    debug!(page = page + 1, width, height, bytes = jpeg.len(), "Artwork prepared");
    Ok(EmbeddedImage { jpeg, width, height })
}

/// Largest size with the image's aspect ratio that fits the box.
pub fn fit_into(image_w: f32, image_h: f32, box_w: f32, box_h: f32) -> (f32, f32) {
    if image_w <= 0.0 || image_h <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (box_w / image_w).min(box_h / image_h);
    (image_w * scale, image_h * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfDocument;
    use crate::pdf::fixtures::{build_pdf, FixturePage};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_window_is_clamped_to_page_count() {
        assert_eq!(artwork_window(0, 10).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(artwork_window(1, 10).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(artwork_window(2, 5).collect::<Vec<_>>(), vec![4]);
        assert_eq!(artwork_window(3, 5).count(), 0);
    }

    #[test]
    fn test_danfe_pages_are_not_artwork() {
        let danfe = Page::new(0, 595.0, 842.0)
            .with_text("danfe\nchave de acesso")
            .with_images(1);
        let label = Page::new(1, 595.0, 842.0).with_text("Rua A").with_images(1);
        let mention = Page::new(1, 595.0, 842.0).with_text("Veja o DANFE").with_images(1);
        let text_only = Page::new(2, 595.0, 842.0).with_text("Rua A");
        assert!(!is_artwork_page(&danfe));
        assert!(is_artwork_page(&label));
        assert!(is_artwork_page(&mention));
        assert!(!is_artwork_page(&text_only));
    }

    #[test]
    fn test_fit_preserves_aspect_ratio() {
        assert_eq!(fit_into(200.0, 100.0, 100.0, 100.0), (100.0, 50.0));
        assert_eq!(fit_into(100.0, 200.0, 100.0, 100.0), (50.0, 100.0));
        assert_eq!(fit_into(0.0, 10.0, 100.0, 100.0), (0.0, 0.0));
    }

    #[test]
    fn test_find_and_prepare_artwork() {
        let bytes = build_pdf(&[
            FixturePage::new()
                .line(40.0, 800.0, "DANFE")
                .line(40.0, 780.0, "CHAVE DE ACESSO")
                .image(4, 4),
            FixturePage::new().line(40.0, 800.0, "Etiqueta").image(8, 6),
        ]);
        let doc = PdfDocument::load(&bytes).unwrap();

        assert_eq!(find_artwork_page(&doc, 0), Some(1));
        assert_eq!(find_artwork_page(&doc, 1), None);

        // whole page at 72 dpi
        let art = prepare_artwork(&doc, 1, 72, 85).unwrap();
        assert!(art.width.abs_diff(595) <= 1);
        assert!(art.height.abs_diff(842) <= 1);
        assert_eq!(&art.jpeg[..2], &[0xFF, 0xD8]);
    }
}
