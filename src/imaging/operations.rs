//! High-level image operations.
//!
//! These functions combine calculations with surface execution: they validate
//! the request, plan the work, and call the [`RasterSurface`].
//!
//! ## Size-constrained encoding
//!
//! [`encode`] walks the [`quality_ladder`] from the caller's hint down to the
//! floor and stops at the first encoding within budget. If even the floor is
//! too large it falls back to [`downscale_steps`] at the floor quality. PNG
//! skips the ladder: quality means nothing to it, so only downscaling helps.
//!
//! The smallest encoding seen is always kept. An unreachable budget therefore
//! still yields a file, never larger than any earlier attempt, flagged with
//! `budget_met == false`.

use super::backend::{BackendError, Dimensions, RasterSurface, flatten_onto_black};
use super::calculations::{downscale_steps, fit_within, quality_ladder};
use super::params::{CompressionSpec, CropRect, Quality, TargetFormat};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Extraction failed: {0}")]
    ExtractionFailed(#[source] BackendError),
    #[error("Encoding failed: {0}")]
    EncodingFailed(#[source] BackendError),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Get image dimensions using the surface.
pub fn get_dimensions(surface: &impl RasterSurface, bytes: &[u8]) -> Result<Dimensions> {
    surface.identify(bytes).map_err(ImagingError::ExtractionFailed)
}

/// Decode `source` and copy `rect` out of it.
///
/// See [`extract_raster`] for the guarantees.
pub fn extract(
    surface: &impl RasterSurface,
    source: &[u8],
    rect: CropRect,
    format: TargetFormat,
) -> Result<DynamicImage> {
    check_shape(rect)?;
    let decoded = surface
        .decode(source)
        .map_err(ImagingError::ExtractionFailed)?;
    extract_raster(surface, &decoded, rect, format)
}

/// Copy `rect` out of an already decoded raster.
///
/// The output is exactly `rect.width × rect.height`, pixel for pixel. For a
/// JPEG target transparent pixels are flattened onto black; PNG and WebP keep
/// alpha.
pub fn extract_raster(
    surface: &impl RasterSurface,
    source: &DynamicImage,
    rect: CropRect,
    format: TargetFormat,
) -> Result<DynamicImage> {
    let bounds = Dimensions::of(source);
    check_shape(rect)?;
    if !rect.fits_within(bounds) {
        return Err(ImagingError::InvalidInput(format!(
            "crop {}x{} at ({}, {}) does not fit inside {bounds}",
            rect.width, rect.height, rect.x, rect.y
        )));
    }

    let drawn = surface
        .draw(source, rect, rect.dimensions())
        .map_err(ImagingError::ExtractionFailed)?;
    Ok(normalize_for(drawn, format))
}

/// Checks that need no pixels: positive area and the aspect lock.
fn check_shape(rect: CropRect) -> Result<()> {
    if rect.is_empty() {
        return Err(ImagingError::InvalidInput(format!(
            "crop must have a positive area, got {}x{}",
            rect.width, rect.height
        )));
    }
    if !rect.honors_aspect() {
        return Err(ImagingError::InvalidInput(format!(
            "crop {}x{} does not match its locked aspect {:.4}",
            rect.width,
            rect.height,
            rect.aspect.unwrap_or_default()
        )));
    }
    Ok(())
}

fn normalize_for(raster: DynamicImage, format: TargetFormat) -> DynamicImage {
    if !format.supports_alpha() && raster.color().has_alpha() {
        DynamicImage::ImageRgb8(flatten_onto_black(&raster))
    } else {
        raster
    }
}

/// Output of a size-constrained encode.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub format: TargetFormat,
    pub dimensions: Dimensions,
    /// Quality of the returned encoding; `None` for lossless formats.
    pub quality: Option<Quality>,
    /// False when even the smallest attempt exceeded the budget.
    pub budget_met: bool,
    /// Number of encodes performed.
    pub attempts: u32,
}

impl Encoded {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

struct Candidate {
    bytes: Vec<u8>,
    dimensions: Dimensions,
    quality: Quality,
}

/// Bookkeeping for the search: budget, attempt count, smallest output so far.
struct Search {
    budget: u64,
    attempts: u32,
    best: Option<Candidate>,
}

impl Search {
    fn new(budget: u64) -> Self {
        Self {
            budget,
            attempts: 0,
            best: None,
        }
    }

    /// Record an attempt; true once it fits the budget.
    fn offer(&mut self, bytes: Vec<u8>, dimensions: Dimensions, quality: Quality) -> bool {
        self.attempts += 1;
        let size = bytes.len() as u64;
        let fits = size <= self.budget;
        log::debug!(
            "encode attempt {}: {dimensions} q{} -> {size} bytes (budget {})",
            self.attempts,
            quality.value(),
            self.budget
        );

        let smaller = self
            .best
            .as_ref()
            .is_none_or(|best| size < best.bytes.len() as u64);
        if smaller {
            self.best = Some(Candidate {
                bytes,
                dimensions,
                quality,
            });
        }
        fits
    }

    /// Handle a backend failure mid-search. Fatal only if nothing was produced yet.
    fn fail(&self, err: BackendError) -> Result<()> {
        if self.best.is_none() {
            return Err(ImagingError::EncodingFailed(err));
        }
        log::warn!("stopping size search after backend failure: {err}");
        Ok(())
    }

    fn finish(self, format: TargetFormat) -> Result<Encoded> {
        let budget = self.budget;
        let attempts = self.attempts;
        let best = self.best.ok_or_else(|| {
            ImagingError::EncodingFailed(BackendError::Encode("no encoding was produced".into()))
        })?;
        let budget_met = best.bytes.len() as u64 <= budget;

        if budget_met {
            log::info!(
                "encoded {format} {} at q{}: {} bytes after {attempts} attempt(s)",
                best.dimensions,
                best.quality.value(),
                best.bytes.len()
            );
        } else {
            log::warn!(
                "size budget of {budget} bytes unmet; best {format} encoding is {} bytes ({})",
                best.bytes.len(),
                best.dimensions
            );
        }

        Ok(Encoded {
            bytes: best.bytes,
            format,
            dimensions: best.dimensions,
            quality: format.is_lossy().then_some(best.quality),
            budget_met,
            attempts,
        })
    }
}

/// Encode `raster` as close to `spec` as the budget allows.
///
/// Dimensions are preserved unless the last-resort downscale runs. Fails with
/// [`ImagingError::EncodingFailed`] only when no encoding could be produced
/// at all, and with [`ImagingError::InvalidInput`] for a zero budget.
pub fn encode(
    surface: &impl RasterSurface,
    raster: &DynamicImage,
    spec: &CompressionSpec,
) -> Result<Encoded> {
    if spec.max_size_bytes == 0 {
        return Err(ImagingError::InvalidInput(
            "maximum size must be greater than zero".into(),
        ));
    }
    let original = Dimensions::of(raster);
    if original.area() == 0 {
        return Err(ImagingError::EncodingFailed(BackendError::Encode(format!(
            "cannot encode a zero-area raster ({original})"
        ))));
    }

    let mut search = Search::new(spec.max_size_bytes);
    let ladder = if spec.format.is_lossy() {
        quality_ladder(spec.quality)
    } else {
        vec![spec.quality]
    };
    let last_resort_quality = *ladder.last().unwrap_or(&spec.quality);

    for quality in ladder {
        match surface.encode(raster, spec.format, quality) {
            Ok(bytes) => {
                if search.offer(bytes, original, quality) {
                    return search.finish(spec.format);
                }
            }
            Err(err) => {
                search.fail(err)?;
                return search.finish(spec.format);
            }
        }
    }

    log::debug!(
        "{} still over budget at q{}; downscaling",
        spec.format,
        last_resort_quality.value()
    );
    let full = CropRect::full(original);
    for dims in downscale_steps(original) {
        let attempt = surface
            .draw(raster, full, dims)
            .and_then(|scaled| surface.encode(&scaled, spec.format, last_resort_quality));
        match attempt {
            Ok(bytes) => {
                if search.offer(bytes, dims, last_resort_quality) {
                    break;
                }
            }
            Err(err) => {
                search.fail(err)?;
                break;
            }
        }
    }

    search.finish(spec.format)
}

/// Extract `rect` from `source` and encode it under `spec`.
pub fn crop_and_compress(
    surface: &impl RasterSurface,
    source: &[u8],
    rect: CropRect,
    spec: &CompressionSpec,
) -> Result<Encoded> {
    let cropped = extract(surface, source, rect, spec.format)?;
    encode(surface, &cropped, spec)
}

/// Scale `raster` down so its longer edge is at most `max_edge`.
///
/// Never upscales; a raster already within the limit is returned as is.
pub fn resize_to_fit(
    surface: &impl RasterSurface,
    raster: &DynamicImage,
    max_edge: u32,
) -> Result<DynamicImage> {
    let original = Dimensions::of(raster);
    let target = fit_within(original, max_edge);
    if target == original {
        return Ok(raster.clone());
    }
    surface
        .draw(raster, CropRect::full(original), target)
        .map_err(ImagingError::ExtractionFailed)
}
