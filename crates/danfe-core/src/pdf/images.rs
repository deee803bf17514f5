//! Image XObject discovery and decoding.

use std::collections::HashSet;

use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::trace;

use crate::error::PdfError;

type Result<T> = std::result::Result<T, PdfError>;

/// Nesting limit when looking for images inside form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// Image XObjects reachable from a resources dictionary, including those
/// nested in form XObjects. Shared objects are reported once.
pub(crate) fn image_streams<'a>(doc: &'a Document, resources: &'a Dictionary) -> Vec<&'a Stream> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    collect_images(doc, resources, 0, &mut seen, &mut images);
    images
}

fn collect_images<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    images: &mut Vec<&'a Stream>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_dict().ok())
    else {
        return;
    };

    for (_name, value) in xobjects.iter() {
        let Ok((id, Object::Stream(stream))) = doc.dereference(value) else {
            continue;
        };
        if let Some(id) = id {
            if !seen.insert(id) {
                continue;
            }
        }

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => images.push(stream),
            Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                if let Some(form_resources) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| doc.dereference(o).ok())
                    .and_then(|(_, o)| o.as_dict().ok())
                {
                    collect_images(doc, form_resources, depth + 1, seen, images);
                }
            }
            _ => {}
        }
    }
}

/// Pixel dimensions declared by an image XObject.
pub(crate) fn image_dimensions(stream: &Stream) -> Option<(u32, u32)> {
    let width = stream.dict.get(b"Width").ok()?.as_i64().ok()?;
    let height = stream.dict.get(b"Height").ok()?.as_i64().ok()?;
    (width > 0 && height > 0).then_some((width as u32, height as u32))
}

/// Decode an image XObject into pixels.
pub(crate) fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage> {
    let dict = &stream.dict;
    let (width, height) = image_dimensions(stream)
        .ok_or_else(|| PdfError::ImageExtraction("image without dimensions".to_string()))?;

    trace!("Decoding image object: {}x{}", width, height);

    let filter = dict.get(b"Filter").ok().and_then(|filter| match filter {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
        _ => None,
    });

    match filter {
        Some(b"DCTDecode") => {
            // JPEG data is stored as-is in the stream
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .map_err(|e| PdfError::ImageExtraction(format!("JPEG decode: {e}")));
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            return Err(PdfError::ImageExtraction(format!(
                "unsupported image filter {}",
                String::from_utf8_lossy(filter.unwrap_or_default())
            )));
        }
        _ => {}
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return Err(PdfError::ImageExtraction(format!(
            "unsupported bits per component: {bits}"
        )));
    }

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .map(|(_, o)| ColorSpace::from_object(doc, o))
        .unwrap_or(ColorSpace::Rgb);

    from_raw(&data, width, height, &color_space)
}

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorSpace>, lookup: Vec<u8> },
    Unsupported(String),
}

impl ColorSpace {
    fn from_object(doc: &Document, obj: &Object) -> Self {
        match obj {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"G" | b"CalGray" => ColorSpace::Gray,
                b"DeviceRGB" | b"RGB" | b"CalRGB" => ColorSpace::Rgb,
                b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
                other => ColorSpace::Unsupported(String::from_utf8_lossy(other).into_owned()),
            },
            Object::Array(arr) => {
                let family = arr.first().and_then(|o| o.as_name().ok());
                match family {
                    Some(b"ICCBased") => {
                        let components = arr
                            .get(1)
                            .and_then(|o| doc.dereference(o).ok())
                            .and_then(|(_, o)| o.as_stream().ok())
                            .and_then(|s| s.dict.get(b"N").ok())
                            .and_then(|n| n.as_i64().ok())
                            .unwrap_or(3);
                        match components {
                            1 => ColorSpace::Gray,
                            4 => ColorSpace::Cmyk,
                            _ => ColorSpace::Rgb,
                        }
                    }
                    Some(b"Indexed") | Some(b"I") => {
                        let base = arr
                            .get(1)
                            .and_then(|o| doc.dereference(o).ok())
                            .map(|(_, o)| ColorSpace::from_object(doc, o))
                            .unwrap_or(ColorSpace::Rgb);
                        let lookup = match arr.get(3).and_then(|o| doc.dereference(o).ok()) {
                            Some((_, Object::String(bytes, _))) => bytes.clone(),
                            Some((_, Object::Stream(s))) => {
                                s.decompressed_content().unwrap_or_else(|_| s.content.clone())
                            }
                            _ => Vec::new(),
                        };
                        ColorSpace::Indexed {
                            base: Box::new(base),
                            lookup,
                        }
                    }
                    Some(other) => {
                        ColorSpace::Unsupported(String::from_utf8_lossy(other).into_owned())
                    }
                    None => ColorSpace::Unsupported("empty".to_string()),
                }
            }
            _ => ColorSpace::Rgb,
        }
    }

    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Unsupported(_) => 0,
        }
    }
}

fn from_raw(data: &[u8], width: u32, height: u32, color_space: &ColorSpace) -> Result<DynamicImage> {
    let pixels = (width as usize) * (height as usize);
    let expected = pixels * color_space.components();
    if data.len() < expected || expected == 0 {
        return Err(PdfError::ImageExtraction(format!(
            "cannot decode {color_space:?} image: {} bytes, expected {}",
            data.len(),
            expected
        )));
    }

    let data = &data[..expected];
    let rgb: Vec<u8> = match color_space {
        ColorSpace::Gray => {
            return ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data.to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| PdfError::ImageExtraction("gray buffer size".to_string()));
        }
        ColorSpace::Rgb => data.to_vec(),
        ColorSpace::Cmyk => data.chunks_exact(4).flat_map(cmyk_to_rgb).collect(),
        ColorSpace::Indexed { base, lookup } => {
            let width = base.components();
            if width == 0 || matches!(**base, ColorSpace::Indexed { .. }) {
                return Err(PdfError::ImageExtraction("unsupported indexed base".to_string()));
            }
            let mut out = Vec::with_capacity(pixels * 3);
            for &index in data {
                let start = index as usize * width;
                let entry = lookup.get(start..start + width).unwrap_or(&BLACK[..width]);
                match **base {
                    ColorSpace::Gray => out.extend_from_slice(&[entry[0]; 3]),
                    ColorSpace::Cmyk => out.extend(cmyk_to_rgb(entry)),
                    _ => out.extend_from_slice(entry),
                }
            }
            out
        }
        ColorSpace::Unsupported(name) => {
            return Err(PdfError::ImageExtraction(format!(
                "unsupported color space {name}"
            )));
        }
    };

    ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| PdfError::ImageExtraction("rgb buffer size".to_string()))
}

/// Lookup entry used for out-of-range palette indices.
const BLACK: [u8; 4] = [0; 4];

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 255 - u16::from(px[3]);
    let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}
