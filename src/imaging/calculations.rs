//! Pure calculation functions for dimensions and the quality search.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::{QUALITY_FLOOR, QUALITY_STEP, Quality};

/// Factor applied to both edges on each last-resort downscale.
pub const DOWNSCALE_FACTOR: f64 = 0.9;

/// Downscaling stops before either edge would drop below this.
pub const MIN_EDGE: u32 = 16;

/// Qualities to try, best first.
///
/// Starts at `hint` and steps down by [`QUALITY_STEP`], always ending exactly
/// on [`QUALITY_FLOOR`]. A hint at or below the floor is tried alone: the
/// search never raises quality.
///
/// ```
/// # use pixel_press::imaging::{Quality, quality_ladder};
/// let ladder: Vec<u32> = quality_ladder(Quality::new(27)).iter().map(|q| q.value()).collect();
/// assert_eq!(ladder, vec![27, 22, 17, 12, 10]);
/// ```
pub fn quality_ladder(hint: Quality) -> Vec<Quality> {
    let start = hint.value();
    if start <= QUALITY_FLOOR {
        return vec![hint];
    }

    let mut ladder: Vec<Quality> = (QUALITY_FLOOR + 1..=start)
        .rev()
        .step_by(QUALITY_STEP as usize)
        .map(Quality::new)
        .collect();
    ladder.push(Quality::new(QUALITY_FLOOR));
    ladder
}

/// Scale both edges by `factor`, rounding and never collapsing below 1 px.
pub fn scale_dimensions(dims: Dimensions, factor: f64) -> Dimensions {
    let scale = |edge: u32| ((f64::from(edge) * factor).round() as u32).max(1);
    Dimensions::new(scale(dims.width), scale(dims.height))
}

/// Successively smaller sizes for the last-resort path.
///
/// Each entry is [`DOWNSCALE_FACTOR`] times the previous one (rounded); the
/// sequence ends before either edge would fall under [`MIN_EDGE`] or when
/// rounding stops making progress.
pub fn downscale_steps(original: Dimensions) -> Vec<Dimensions> {
    let mut steps = Vec::new();
    let mut current = original;

    loop {
        let next = scale_dimensions(current, DOWNSCALE_FACTOR);
        if next.width < MIN_EDGE || next.height < MIN_EDGE || next == current {
            break;
        }
        steps.push(next);
        current = next;
    }

    steps
}

/// Dimensions that fit within `max_edge` on the longer side.
///
/// Preserves aspect ratio and never upscales: images already within the
/// limit come back unchanged.
pub fn fit_within(dims: Dimensions, max_edge: u32) -> Dimensions {
    let longer = dims.width.max(dims.height);
    if longer <= max_edge || max_edge == 0 {
        return dims;
    }

    if dims.width >= dims.height {
        // Landscape or square
        let ratio = f64::from(max_edge) / f64::from(dims.width);
        Dimensions::new(
            max_edge,
            ((f64::from(dims.height) * ratio).round() as u32).max(1),
        )
    } else {
        // Portrait
        let ratio = f64::from(max_edge) / f64::from(dims.height);
        Dimensions::new(
            ((f64::from(dims.width) * ratio).round() as u32).max(1),
            max_edge,
        )
    }
}

/// Largest box of the given aspect ratio that fits inside `container`.
///
/// One edge of the result always matches the container exactly.
///
/// # Arguments
/// * `container` - Available area as (width, height)
/// * `aspect` - Target width / height
pub fn largest_box_with_aspect(container: (f64, f64), aspect: f64) -> (f64, f64) {
    let (cw, ch) = container;
    if cw / ch > aspect {
        // Container is wider: height matches
        (ch * aspect, ch)
    } else {
        // Container is taller: width matches
        (cw, cw / aspect)
    }
}
