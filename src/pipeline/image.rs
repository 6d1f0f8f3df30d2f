//! Image → single-page PDF.
//!
//! JPEG data is embedded byte-for-byte as a `DCTDecode` stream, so scans
//! keep their original quality. The colour space comes from the JPEG frame
//! header: 1 component is gray, 3 are RGB, 4 are CMYK (Adobe CMYK files
//! store inverted samples and get a `/Decode` array). Other raster formats
//! (PNG, BMP, TIFF) have no PDF-native filter and are embedded as lossless
//! Flate-compressed RGB at their own bit depth (8 or 16), with any alpha
//! channel carried as a soft mask.
//!
//! Undecodable JPEG bytes are not rejected outright: the wrapper still gets
//! a chance using the frame header alone, which rescues truncated scans.

use crate::error::FileError;
use image::{ColorType, DynamicImage, ImageFormat};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, warn};

/// Largest page edge PDF viewers accept, in points.
const MAX_PAGE_EDGE: u32 = 14_400;

/// Convert image bytes into a one-page PDF.
///
/// Returns [`FileError::Rejected`] when the image decodes and both edges are
/// at most `min_dimension` pixels.
pub fn image_to_pdf(bytes: &[u8], min_dimension: u32) -> Result<Vec<u8>, FileError> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(img) => {
            if img.width() <= min_dimension && img.height() <= min_dimension {
                return Err(FileError::Rejected {
                    reason: format!(
                        "image {}x{} px is at most {min_dimension} px on both edges",
                        img.width(),
                        img.height()
                    ),
                });
            }
            Some(img)
        }
        Err(e) => {
            warn!("Image decode failed ({}), wrapping raw bytes anyway", e);
            None
        }
    };

    let format = image::guess_format(bytes).ok();
    let (width, height, image_stream, soft_mask) = match (format, decoded) {
        (Some(ImageFormat::Jpeg), _) => {
            let header = jpeg_header(bytes).ok_or_else(|| FileError::Decode {
                detail: "JPEG has no readable frame header".into(),
            })?;
            let stream = jpeg_stream(bytes, &header)?;
            (header.width, header.height, stream, None)
        }
        (_, Some(img)) => {
            let (w, h) = (img.width(), img.height());
            let (stream, mask) = raster_streams(&img)?;
            (w, h, stream, mask)
        }
        (_, None) => {
            return Err(FileError::Decode {
                detail: "bytes are neither a decodable image nor a JPEG".into(),
            })
        }
    };

    debug!("Wrapping {}x{} px image into PDF", width, height);
    single_page_pdf(width, height, image_stream, soft_mask)
}

/// Fields of a JPEG frame header (SOFn) needed to embed the stream as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
    /// An Adobe APP14 segment precedes the frame.
    adobe: bool,
}

/// Walk the marker segments up to the first frame header.
fn jpeg_header(bytes: &[u8]) -> Option<JpegHeader> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut adobe = false;
    let mut i = 2;
    loop {
        if *bytes.get(i)? != 0xFF {
            return None;
        }
        while *bytes.get(i)? == 0xFF {
            i += 1;
        }
        let marker = bytes[i];
        i += 1;

        match marker {
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => continue,
            // End of image or start of scan: no frame header came first.
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let len = u16::from_be_bytes([*bytes.get(i)?, *bytes.get(i + 1)?]) as usize;
        let data = bytes.get(i + 2..i + len)?;
        match marker {
            // SOF0..SOF15 except DHT (C4), JPG (C8) and DAC (CC).
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if data.len() < 6 {
                    return None;
                }
                let height = u16::from_be_bytes([data[1], data[2]]) as u32;
                let width = u16::from_be_bytes([data[3], data[4]]) as u32;
                if width == 0 || height == 0 {
                    return None;
                }
                return Some(JpegHeader {
                    width,
                    height,
                    components: data[5],
                    adobe,
                });
            }
            0xEE if data.starts_with(b"Adobe") => adobe = true,
            _ => {}
        }
        i += len;
    }
}

fn jpeg_stream(bytes: &[u8], header: &JpegHeader) -> Result<Stream, FileError> {
    let color_space = match header.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(FileError::Decode {
                detail: format!("JPEG with {n} colour components has no PDF colour space"),
            })
        }
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => header.width as i64,
        "Height" => header.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    if header.components == 4 && header.adobe {
        let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
            .into_iter()
            .map(Object::Integer)
            .collect();
        dict.set("Decode", decode);
    }
    Ok(Stream::new(dict, bytes.to_vec()))
}

fn is_sixteen_bit(color: ColorType) -> bool {
    matches!(
        color,
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16
    )
}

/// Colour samples plus an optional alpha soft mask.
fn raster_streams(img: &DynamicImage) -> Result<(Stream, Option<Stream>), FileError> {
    let (width, height) = (img.width(), img.height());
    let sixteen = is_sixteen_bit(img.color());

    // PDF samples wider than 8 bits are big-endian.
    let (bits, samples): (i64, Vec<u8>) = if sixteen {
        let raw = img.to_rgb16().into_raw();
        (16, raw.iter().flat_map(|v| v.to_be_bytes()).collect())
    } else {
        (8, img.to_rgb8().into_raw())
    };
    let image = flate_image(width, height, "DeviceRGB", bits, samples)?;

    if !img.color().has_alpha() {
        return Ok((image, None));
    }
    let alpha: Vec<u8> = if sixteen {
        img.to_rgba16()
            .pixels()
            .flat_map(|p| p.0[3].to_be_bytes())
            .collect()
    } else {
        img.to_rgba8().pixels().map(|p| p.0[3]).collect()
    };
    let mask = flate_image(width, height, "DeviceGray", bits, alpha)?;
    Ok((image, Some(mask)))
}

fn flate_image(
    width: u32,
    height: u32,
    color_space: &str,
    bits: i64,
    samples: Vec<u8>,
) -> Result<Stream, FileError> {
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => bits,
        },
        samples,
    );
    stream.compress().map_err(|e| FileError::Decode {
        detail: format!("flate compression failed: {e}"),
    })?;
    Ok(stream)
}

/// Page edges in points: one pixel per point, scaled down to the PDF limit.
fn page_size(width: u32, height: u32) -> (i64, i64) {
    let longest = width.max(height).max(1);
    if longest <= MAX_PAGE_EDGE {
        return (width as i64, height as i64);
    }
    let scale = MAX_PAGE_EDGE as f64 / longest as f64;
    (
        ((width as f64 * scale).round() as i64).max(1),
        ((height as f64 * scale).round() as i64).max(1),
    )
}

fn single_page_pdf(
    width: u32,
    height: u32,
    mut image: Stream,
    soft_mask: Option<Stream>,
) -> Result<Vec<u8>, FileError> {
    let (page_w, page_h) = page_size(width, height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    if let Some(mask) = soft_mask {
        let mask_id = doc.add_object(mask);
        image.dict.set("SMask", Object::Reference(mask_id));
    }
    let image_id = doc.add_object(image);

    let content = format!("q\n{page_w} 0 0 {page_h} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(page_w),
            Object::Integer(page_h),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| FileError::Decode {
        detail: format!("PDF assembly failed: {e}"),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use lopdf::Dictionary;
    use std::io::Cursor;

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
        encode_dynamic(&img, format)
    }

    fn encode_dynamic(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .expect("encode should succeed");
        buf
    }

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).expect("valid PDF").get_pages().len()
    }

    /// Dictionaries of every image XObject in the document.
    fn image_dicts(pdf: &[u8]) -> Vec<Dictionary> {
        let doc = Document::load_mem(pdf).expect("valid PDF");
        doc.objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| {
                s.dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map(|n| n == b"Image")
                    .unwrap_or(false)
            })
            .map(|s| s.dict.clone())
            .collect()
    }

    fn name<'a>(dict: &'a Dictionary, key: &[u8]) -> &'a [u8] {
        dict.get(key).and_then(|v| v.as_name()).expect("name entry")
    }

    /// Header-only CMYK JPEG: SOI, optional Adobe APP14, SOF0 with four
    /// components, EOI. Enough for the wrapper, not for a decoder.
    fn cmyk_jpeg(width: u16, height: u16, adobe: bool) -> Vec<u8> {
        let mut jpg = vec![0xFF, 0xD8];
        if adobe {
            jpg.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
            jpg.extend_from_slice(b"Adobe");
            jpg.extend_from_slice(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
        }
        jpg.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x14, 0x08]);
        jpg.extend_from_slice(&height.to_be_bytes());
        jpg.extend_from_slice(&width.to_be_bytes());
        jpg.push(4);
        for id in 1..=4u8 {
            jpg.extend_from_slice(&[id, 0x11, 0x00]);
        }
        jpg.extend_from_slice(&[0xFF, 0xD9]);
        jpg
    }

    #[test]
    fn thumbnail_is_rejected() {
        let jpg = encode(100, 100, ImageFormat::Jpeg);
        let err = image_to_pdf(&jpg, 300).unwrap_err();
        assert!(matches!(err, FileError::Rejected { .. }), "got {err:?}");
    }

    #[test]
    fn exactly_at_limit_is_rejected() {
        let png = encode(300, 300, ImageFormat::Png);
        assert!(matches!(
            image_to_pdf(&png, 300),
            Err(FileError::Rejected { .. })
        ));
    }

    #[test]
    fn one_large_edge_is_enough() {
        let jpg = encode(400, 300, ImageFormat::Jpeg);
        let pdf = image_to_pdf(&jpg, 300).expect("400x300 should convert");
        assert!(pdf.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&pdf), 1);
    }

    #[test]
    fn jpeg_bytes_are_embedded_unchanged() {
        let jpg = encode(320, 480, ImageFormat::Jpeg);
        let pdf = image_to_pdf(&jpg, 300).unwrap();
        assert!(
            pdf.windows(jpg.len()).any(|w| w == jpg.as_slice()),
            "original JPEG stream should appear verbatim"
        );
        let dicts = image_dicts(&pdf);
        assert_eq!(name(&dicts[0], b"ColorSpace"), b"DeviceRGB");
    }

    #[test]
    fn gray_jpeg_uses_device_gray() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(400, 400, Luma([90])));
        let jpg = encode_dynamic(&img, ImageFormat::Jpeg);
        let pdf = image_to_pdf(&jpg, 300).unwrap();
        assert_eq!(name(&image_dicts(&pdf)[0], b"ColorSpace"), b"DeviceGray");
    }

    #[test]
    fn cmyk_jpeg_uses_device_cmyk() {
        let jpg = cmyk_jpeg(400, 500, false);
        let pdf = image_to_pdf(&jpg, 300).unwrap();
        let dicts = image_dicts(&pdf);
        assert_eq!(dicts.len(), 1);
        assert_eq!(name(&dicts[0], b"ColorSpace"), b"DeviceCMYK");
        assert!(!dicts[0].has(b"Decode"));
        assert_eq!(dicts[0].get(b"Width").unwrap().as_i64().unwrap(), 400);
        assert_eq!(dicts[0].get(b"Height").unwrap().as_i64().unwrap(), 500);
    }

    #[test]
    fn adobe_cmyk_jpeg_is_inverted() {
        let pdf = image_to_pdf(&cmyk_jpeg(400, 400, true), 300).unwrap();
        let dicts = image_dicts(&pdf);
        assert_eq!(name(&dicts[0], b"ColorSpace"), b"DeviceCMYK");
        let decode = dicts[0].get(b"Decode").unwrap().as_array().unwrap();
        let values: Vec<i64> = decode.iter().map(|o| o.as_i64().unwrap()).collect();
        assert_eq!(values, vec![1, 0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn frame_header_is_found_after_other_segments() {
        let header = jpeg_header(&encode(321, 123, ImageFormat::Jpeg)).unwrap();
        assert_eq!((header.width, header.height, header.components), (321, 123, 3));
        assert!(!header.adobe);
        assert!(jpeg_header(b"\xFF\xD8\xFF\xD9").is_none());
        assert!(jpeg_header(b"\xFF\xD8\xFF\xC0\x00").is_none());
    }

    #[test]
    fn png_converts_losslessly() {
        let png = encode(640, 200, ImageFormat::Png);
        let pdf = image_to_pdf(&png, 300).unwrap();
        assert_eq!(page_count(&pdf), 1);
        assert!(image_dicts(&pdf).iter().all(|d| !d.has(b"SMask")));
    }

    #[test]
    fn transparent_png_keeps_alpha_as_soft_mask() {
        let mut img = RgbaImage::from_pixel(400, 400, Rgba([0, 0, 0, 0]));
        img.put_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let png = encode_dynamic(&DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let pdf = image_to_pdf(&png, 300).unwrap();

        let dicts = image_dicts(&pdf);
        assert_eq!(dicts.len(), 2);
        let main = dicts.iter().find(|d| d.has(b"SMask")).expect("image with SMask");
        assert_eq!(name(main, b"ColorSpace"), b"DeviceRGB");
        let mask = dicts.iter().find(|d| !d.has(b"SMask")).unwrap();
        assert_eq!(name(mask, b"ColorSpace"), b"DeviceGray");
    }

    #[test]
    fn sixteen_bit_png_keeps_depth() {
        let img = image::ImageBuffer::<Rgb<u16>, _>::from_pixel(400, 310, Rgb([65535u16, 1, 300]));
        let png = encode_dynamic(&DynamicImage::ImageRgb16(img), ImageFormat::Png);
        let pdf = image_to_pdf(&png, 300).unwrap();
        let dicts = image_dicts(&pdf);
        assert_eq!(dicts[0].get(b"BitsPerComponent").unwrap().as_i64().unwrap(), 16);
    }

    #[test]
    fn bmp_converts() {
        let bmp = encode(301, 10, ImageFormat::Bmp);
        assert!(image_to_pdf(&bmp, 300).is_ok());
    }

    #[test]
    fn garbage_yields_decode_error() {
        let err = image_to_pdf(b"definitely not an image", 300).unwrap_err();
        assert!(matches!(err, FileError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn page_size_caps_huge_images() {
        assert_eq!(page_size(800, 600), (800, 600));
        assert_eq!(page_size(28_800, 7_200), (14_400, 3_600));
    }
}
