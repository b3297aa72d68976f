//! Pure Rust raster surface built on the `image` crate, with libwebp for
//! lossy WebP.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageDecoder::dimensions` (header only), edges swapped for quarter-turn EXIF orientations |
//! | Decode (JPEG, PNG, WebP) | `image` crate decoders, format sniffed from content, EXIF orientation applied |
//! | Draw 1:1 | `image::DynamicImage::crop_imm` |
//! | Draw scaled | `crop_imm` + `resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (RGB only) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (best compression, adaptive filter, 8 or 16 bit as decoded) |
//! | Encode → WebP | `webp::Encoder` (lossy, libwebp) |

use super::backend::{BackendError, Dimensions, RasterSurface, flatten_onto_black};
use super::params::{CropRect, Quality, TargetFormat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{
    ColorType, DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat,
    ImageReader,
};
use std::io::Cursor;

/// Largest surface we agree to allocate, in pixels.
///
/// Matches the 16384×16384 canvas ceiling browsers enforce.
pub const MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

/// libwebp refuses anything wider or taller than this.
const WEBP_MAX_EDGE: u32 = 16_383;

/// Extensions with a decoder compiled in, paired with their MIME type.
const DECODABLE: &[(&str, ImageFormat, &str)] = &[
    ("jpg", ImageFormat::Jpeg, "image/jpeg"),
    ("jpeg", ImageFormat::Jpeg, "image/jpeg"),
    ("png", ImageFormat::Png, "image/png"),
    ("webp", ImageFormat::WebP, "image/webp"),
];

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> Vec<&'static str> {
    DECODABLE
        .iter()
        .filter(|(_, fmt, _)| fmt.reading_enabled())
        .map(|(ext, _, _)| *ext)
        .collect()
}

/// Surface backed by the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustSurface;

impl RustSurface {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BackendError::Decode(format!("Failed to sniff image format: {e}")))
}

/// EXIF orientation of the image, upright when absent or unreadable.
fn orientation_of(decoder: &mut impl ImageDecoder) -> Orientation {
    decoder.orientation().unwrap_or(Orientation::NoTransforms)
}

fn swaps_edges(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Reject surfaces a canvas could not allocate either.
fn acquire(dst: Dimensions) -> Result<(), BackendError> {
    if dst.width == 0 || dst.height == 0 {
        return Err(BackendError::SurfaceUnavailable(format!(
            "zero-area surface requested ({dst})"
        )));
    }
    if dst.area() > MAX_SURFACE_PIXELS {
        return Err(BackendError::SurfaceUnavailable(format!(
            "{dst} exceeds the {MAX_SURFACE_PIXELS} pixel limit"
        )));
    }
    Ok(())
}

fn encode_jpeg(raster: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    // The JPEG encoder rejects alpha.
    let rgb = flatten_onto_black(raster);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_png(raster: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let widened;
    let raster = match raster.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16 => raster,
        // PNG has no float samples; 16 bits per channel is the closest fit.
        color if color.has_alpha() => {
            widened = DynamicImage::ImageRgba16(raster.to_rgba16());
            &widened
        }
        _ => {
            widened = DynamicImage::ImageRgb16(raster.to_rgb16());
            &widened
        }
    };

    let mut buf = Vec::new();
    PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive)
        .write_image(
            raster.as_bytes(),
            raster.width(),
            raster.height(),
            raster.color().into(),
        )
        .map_err(|e| BackendError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_webp(raster: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let (width, height) = (raster.width(), raster.height());
    if width > WEBP_MAX_EDGE || height > WEBP_MAX_EDGE {
        return Err(BackendError::Encode(format!(
            "WebP cannot encode {width}x{height} (max edge {WEBP_MAX_EDGE})"
        )));
    }
    let q = quality.value() as f32;
    let memory = if raster.color().has_alpha() {
        let rgba = raster.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, q)
    } else {
        let rgb = raster.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, q)
    };
    memory
        .map(|m| m.to_vec())
        .map_err(|e| BackendError::Encode(format!("WebP encode failed: {e:?}")))
}

impl RasterSurface for RustSurface {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let mut decoder = reader(bytes)?
            .into_decoder()
            .map_err(|e| BackendError::Decode(format!("Failed to read header: {e}")))?;
        let (width, height) = decoder.dimensions();
        // Report what the user sees: quarter turns swap the edges.
        if swaps_edges(orientation_of(&mut decoder)) {
            Ok(Dimensions::new(height, width))
        } else {
            Ok(Dimensions::new(width, height))
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        let mut decoder = reader(bytes)?
            .into_decoder()
            .map_err(|e| BackendError::Decode(format!("Failed to read header: {e}")))?;
        let orientation = orientation_of(&mut decoder);
        let mut raster = DynamicImage::from_decoder(decoder)
            .map_err(|e| BackendError::Decode(format!("Failed to decode image: {e}")))?;
        raster.apply_orientation(orientation);
        Ok(raster)
    }

    fn draw(
        &self,
        source: &DynamicImage,
        src: CropRect,
        dst: Dimensions,
    ) -> Result<DynamicImage, BackendError> {
        acquire(dst)?;
        if !src.fits_within(Dimensions::of(source)) {
            return Err(BackendError::SurfaceUnavailable(format!(
                "source region {src:?} outside {}",
                Dimensions::of(source)
            )));
        }
        let region = source.crop_imm(src.x, src.y, src.width, src.height);
        if src.dimensions() == dst {
            Ok(region)
        } else {
            Ok(region.resize_exact(dst.width, dst.height, FilterType::Lanczos3))
        }
    }

    fn encode(
        &self,
        raster: &DynamicImage,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(BackendError::Encode("cannot encode an empty raster".into()));
        }
        match format {
            TargetFormat::Jpeg => encode_jpeg(raster, quality),
            TargetFormat::Png => encode_png(raster),
            TargetFormat::WebP => encode_webp(raster, quality),
        }
    }
}
