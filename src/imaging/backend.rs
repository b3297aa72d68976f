//! Raster surface trait and shared types.
//!
//! The [`RasterSurface`] trait is the capability every pixel backend must
//! offer: identify, decode, draw a source region onto a fresh surface, and
//! encode a surface to a container format. It is the only place pixels are
//! touched, so the crop and compression logic above it stays backend-agnostic.
//!
//! The production implementation is
//! [`RustSurface`](super::rust_backend::RustSurface). Tests use the recording
//! `MockSurface` in this module, whose encoded sizes follow a simple model so
//! the quality search can be checked exactly.

use super::params::{CropRect, Quality, TargetFormat};
use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Decoding failed: {0}")]
    Decode(String),
    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(raster: &DynamicImage) -> Self {
        Self::new(raster.width(), raster.height())
    }

    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Width divided by height.
    pub fn aspect_ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Drop alpha the way a canvas JPEG export does: composite onto black.
///
/// Rasters without alpha are only converted to 8-bit RGB.
pub fn flatten_onto_black(raster: &DynamicImage) -> RgbImage {
    if !raster.color().has_alpha() {
        return raster.to_rgb8();
    }
    let rgba = raster.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        Rgb([over(r), over(g), over(b)])
    })
}

/// A drawing and encoding surface.
///
/// Mirrors a 2D canvas: `draw` copies `src` out of the source into a new
/// surface of `dst` size (1:1 when the sizes agree, resampled otherwise), and
/// `encode` serializes a surface. `Sync` so a session can be shared with
/// background workers.
pub trait RasterSurface: Sync {
    /// Read dimensions without a full decode where the format allows it.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode a complete image file.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Draw `src` from `source` onto a new surface of size `dst`.
    fn draw(
        &self,
        source: &DynamicImage,
        src: CropRect,
        dst: Dimensions,
    ) -> Result<DynamicImage, BackendError>;

    /// Serialize a raster. `quality` is ignored by lossless formats.
    fn encode(
        &self,
        raster: &DynamicImage,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}

impl<T: RasterSurface + Send> RasterSurface for std::sync::Arc<T> {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        (**self).identify(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        (**self).decode(bytes)
    }

    fn draw(
        &self,
        source: &DynamicImage,
        src: CropRect,
        dst: Dimensions,
    ) -> Result<DynamicImage, BackendError> {
        (**self).draw(source, src, dst)
    }

    fn encode(
        &self,
        raster: &DynamicImage,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        (**self).encode(raster, format, quality)
    }
}
