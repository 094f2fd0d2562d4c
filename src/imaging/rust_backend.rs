//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary. WebP output is lossless
//! because the `image` crate ships no lossy WebP encoder, so the configured
//! WebP quality has no effect here.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize` with `Lanczos3` filter |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Placeholder | `DynamicImage::thumbnail` + `blur`, JPEG q40 |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{PlaceholderParams, ResizeParams};
use crate::naming::AssetFormat;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

/// JPEG quality of the sidecar preview. The preview is blurred, so detail is moot.
const PLACEHOLDER_QUALITY: u8 = 40;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Drop to 8-bit RGB or RGBA, the only layouts every encoder here accepts.
fn to_encodable(img: &DynamicImage, keep_alpha: bool) -> DynamicImage {
    if keep_alpha && img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Encode `img` in `format` into any writer.
pub fn encode_image<W: Write>(
    img: &DynamicImage,
    format: AssetFormat,
    quality: u32,
    writer: W,
) -> Result<(), BackendError> {
    let quality = quality.clamp(1, 100) as u8;
    let result = match format {
        AssetFormat::Jpeg => {
            to_encodable(img, false).write_with_encoder(JpegEncoder::new_with_quality(writer, quality))
        }
        AssetFormat::Webp => {
            to_encodable(img, true).write_with_encoder(WebPEncoder::new_lossless(writer))
        }
        AssetFormat::Avif => to_encodable(img, true)
            .write_with_encoder(AvifEncoder::new_with_speed_quality(writer, 6, quality)),
        AssetFormat::Png => to_encodable(img, true).write_with_encoder(PngEncoder::new(writer)),
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{format} encode failed: {e}")))
}

/// Encode `img` and save it to `path`.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: AssetFormat,
    quality: u32,
) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let mut writer = BufWriter::new(file);
    encode_image(img, format, quality, &mut writer)?;
    writer.flush().map_err(BackendError::Io)
}

/// A 1×1 mid-grey image encoded in `format`.
///
/// Used to stand in for files that vanished from under a link.
pub fn single_pixel(format: AssetFormat) -> Result<Vec<u8>, BackendError> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(1, 1, image::Rgb([128, 128, 128])));
    let mut buf = Cursor::new(Vec::new());
    encode_image(&img, format, 80, &mut buf)?;
    Ok(buf.into_inner())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_image(
            &resized,
            &params.output,
            params.format,
            params.quality.value(),
        )
    }

    fn placeholder(&self, params: &PlaceholderParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source)?;
        let small = img.thumbnail(params.width, params.height).blur(params.blur_sigma);
        let mut buf = Cursor::new(Vec::new());
        encode_image(
            &small,
            AssetFormat::Jpeg,
            PLACEHOLDER_QUALITY as u32,
            &mut buf,
        )?;
        Ok(buf.into_inner())
    }
}
