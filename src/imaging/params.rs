//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what to extract and how hard to compress) and the
//! [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping surfaces (e.g. for testing with a mock) without
//! changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`TargetFormat`]: Output container: JPEG, PNG or WebP.
//! - [`CropRect`]: Pixel-space rectangle within the source image.
//! - [`CompressionSpec`]: Target format, quality hint and byte budget.

use super::backend::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest quality the encoder will search down to.
pub const QUALITY_FLOOR: u32 = 10;

/// Distance between two rungs of the quality ladder.
pub const QUALITY_STEP: u32 = 5;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn floor() -> Self {
        Self(QUALITY_FLOOR)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 3] = [TargetFormat::Jpeg, TargetFormat::Png, TargetFormat::WebP];

    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
            TargetFormat::WebP => "image/webp",
        }
    }

    /// File extension used for downloads: `jpg` for JPEG, otherwise the MIME subtype.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::WebP => "webp",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.mime_type().eq_ignore_ascii_case(mime.trim()))
    }

    /// Whether the quality parameter affects the encoding.
    pub fn is_lossy(self) -> bool {
        !matches!(self, TargetFormat::Png)
    }

    /// Whether the container can carry an alpha channel.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, TargetFormat::Jpeg)
    }

    /// Name given to a processed file of this format.
    pub fn output_file_name(self) -> String {
        format!("cropped.{}", self.extension())
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TargetFormat::Jpeg => "JPEG",
            TargetFormat::Png => "PNG",
            TargetFormat::WebP => "WEBP",
        };
        f.write_str(label)
    }
}

/// Rectangle in source-pixel coordinates.
///
/// `aspect` is the width/height ratio the rectangle was locked to when it was
/// drawn, if any. Extraction refuses a rectangle that does not honor it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<f64>,
}

impl CropRect {
    /// Unconstrained rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            aspect: None,
        }
    }

    pub fn with_aspect(self, ratio: f64) -> Self {
        Self {
            aspect: Some(ratio),
            ..self
        }
    }

    /// False only when an aspect lock is set and `width / height` misses it.
    pub fn honors_aspect(&self) -> bool {
        self.aspect.is_none_or(|ratio| self.matches_aspect(ratio))
    }

    /// The whole image.
    pub fn full(dims: Dimensions) -> Self {
        Self::new(0, 0, dims.width, dims.height)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the rectangle has area and lies entirely inside `bounds`.
    pub fn fits_within(&self, bounds: Dimensions) -> bool {
        !self.is_empty()
            && u64::from(self.x) + u64::from(self.width) <= u64::from(bounds.width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(bounds.height)
    }

    /// Whether `width / height` equals `ratio` up to whole-pixel rounding.
    ///
    /// The side derived from the other is off by at most half a pixel, which
    /// in width units is `0.5 * max(ratio, 1)`.
    pub fn matches_aspect(&self, ratio: f64) -> bool {
        if self.is_empty() || !ratio.is_finite() || ratio <= 0.0 {
            return false;
        }
        let error = (f64::from(self.width) - f64::from(self.height) * ratio).abs();
        error <= 0.5 * ratio.max(1.0) + 1e-9
    }
}

/// What the user asked for: format, starting quality and a byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSpec {
    pub format: TargetFormat,
    pub quality: Quality,
    pub max_size_bytes: u64,
}

impl Default for CompressionSpec {
    fn default() -> Self {
        Self {
            format: TargetFormat::default(),
            quality: Quality::default(),
            max_size_bytes: 500 * 1024,
        }
    }
}

// Quality travels as a bare number in settings and reports.
impl Serialize for Quality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Quality::new)
    }
}
