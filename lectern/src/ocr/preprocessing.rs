use crate::error::{LecternError, Result};
use image::{DynamicImage, GenericImageView, ImageReader};

/// Output quality for the fixed JPEG encoding.
const JPEG_QUALITY: u8 = 85;

/// A frame after preprocessing: JPEG bytes plus the encoded dimensions.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Prepare a raw frame for submission to the recognition backend.
///
/// Pure transform, in order:
/// 1. Mirror correction (undoes a horizontally flipped source)
/// 2. Quarter-turn rotation (`0`, `90`, `180` or `270` degrees clockwise)
/// 3. Downscale so the larger dimension does not exceed `max_size`
/// 4. Alpha removal and JPEG encoding at quality 85
///
/// Resize rule: when `max(width, height) <= max_size` the dimensions are
/// left untouched. Otherwise both dimensions are multiplied by
/// `max_size / max(width, height)` and rounded independently, so the
/// aspect ratio may drift by at most one pixel.
pub fn transform(bytes: &[u8], rotation: u32, mirror: bool, max_size: u32) -> Result<ProcessedFrame> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LecternError::Preprocess(format!("Failed to read frame: {e}")))?;

    let img = reader
        .decode()
        .map_err(|e| LecternError::Preprocess(format!("Failed to decode frame: {e}")))?;

    let img = if mirror { img.fliph() } else { img };
    let img = apply_rotation(img, rotation)?;
    let img = resize_if_needed(img, max_size);
    let img = remove_alpha(img);

    let (width, height) = img.dimensions();
    let bytes = encode_jpeg(&img)?;

    Ok(ProcessedFrame {
        bytes,
        width,
        height,
    })
}

fn apply_rotation(img: DynamicImage, rotation: u32) -> Result<DynamicImage> {
    match rotation {
        0 => Ok(img),
        90 => Ok(img.rotate90()),
        180 => Ok(img.rotate180()),
        270 => Ok(img.rotate270()),
        other => Err(LecternError::Preprocess(format!(
            "Invalid rotation {other}: must be 0, 90, 180 or 270"
        ))),
    }
}

/// Downscale so the larger dimension equals `max_size` exactly, leaving
/// smaller images untouched. Both target dimensions are rounded
/// independently and clamped to at least one pixel.
fn resize_if_needed(img: DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    if width.max(height) <= max_size {
        return img;
    }

    let scale = max_size as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);

    img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

/// Strip the alpha channel; JPEG has no transparency.
fn remove_alpha(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgb8(img.to_rgb8()),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            DynamicImage::ImageLuma8(img.to_luma8())
        }
        _ => img,
    }
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut output);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| LecternError::Preprocess(format!("Failed to encode frame: {e}")))?;
    Ok(output)
}
