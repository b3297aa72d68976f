//! Image processing: decode, crop and size-budgeted encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Crop** | `DynamicImage::crop_imm` (1:1, never resampled) |
//! | **Encode JPEG / PNG** | `image` codecs |
//! | **Encode WebP** | `webp` (libwebp, lossy) |
//! | **Downscale** | `resize_exact` with Lanczos3 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math and the quality ladder (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`RasterSurface`] trait + [`RustSurface`]
//! - **Operations**: High-level functions combining calculations + surface

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, RasterSurface, flatten_onto_black};
pub use calculations::{
    DOWNSCALE_FACTOR, MIN_EDGE, downscale_steps, fit_within, largest_box_with_aspect,
    quality_ladder,
};
pub use operations::{
    Encoded, ImagingError, crop_and_compress, encode, extract, extract_raster, get_dimensions,
    resize_to_fit,
};
pub use params::{CompressionSpec, CropRect, QUALITY_FLOOR, QUALITY_STEP, Quality, TargetFormat};
pub use rust_backend::{MAX_SURFACE_PIXELS, RustSurface, supported_input_extensions};
