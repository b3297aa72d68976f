//! Interactive crop geometry.
//!
//! A [`CropController`] models an image shown inside a viewport. The image
//! is fitted to the viewport (aspect preserved, "contain"), a crop box of the
//! active [`AspectPreset`] sits centered over it, zoom magnifies the image
//! underneath the box, and dragging pans the image. After every gesture,
//! [`CropController::crop_rect`] maps the box back into source pixels.
//!
//! ```text
//!   viewport ┌──────────────────────────┐
//!            │   ┌──────────────────┐   │  displayed image = source × scale × zoom
//!            │   │    ┌────────┐    │   │
//!            │   │    │  box   │    │   │  box = largest preset-aspect box in the
//!            │   │    └────────┘    │   │        displayed image at zoom 1
//!            │   └──────────────────┘   │
//!            └──────────────────────────┘
//! ```
//!
//! Pan offsets are clamped so the box never leaves the image. Only the most
//! recent rectangle matters: there is no history.

use crate::imaging::{CropRect, Dimensions, largest_box_with_aspect};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 3.0;

#[derive(Error, Debug, PartialEq)]
pub enum CropError {
    #[error("{what} must have a positive area, got {dims}")]
    EmptyArea { what: &'static str, dims: Dimensions },
}

/// Aspect constraint chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectPreset {
    /// The source image's own width / height.
    #[default]
    #[serde(rename = "original")]
    Original,
    /// Unconstrained.
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "4:3")]
    Standard,
}

impl AspectPreset {
    pub const ALL: [AspectPreset; 5] = [
        AspectPreset::Original,
        AspectPreset::Free,
        AspectPreset::Square,
        AspectPreset::Widescreen,
        AspectPreset::Standard,
    ];

    /// Ratio for an image of `natural` size; `None` when unconstrained.
    pub fn ratio(self, natural: Dimensions) -> Option<f64> {
        match self {
            AspectPreset::Original => Some(natural.aspect_ratio()),
            AspectPreset::Free => None,
            AspectPreset::Square => Some(1.0),
            AspectPreset::Widescreen => Some(16.0 / 9.0),
            AspectPreset::Standard => Some(4.0 / 3.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectPreset::Original => "Original",
            AspectPreset::Free => "Free form",
            AspectPreset::Square => "Square 1:1",
            AspectPreset::Widescreen => "16:9",
            AspectPreset::Standard => "4:3",
        }
    }
}

impl fmt::Display for AspectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Gesture state over one displayed image.
#[derive(Debug, Clone, PartialEq)]
pub struct CropController {
    natural: Dimensions,
    viewport: Dimensions,
    preset: AspectPreset,
    zoom: f64,
    /// Image pan relative to centered, in viewport pixels.
    offset: (f64, f64),
    /// Free-form box size in viewport pixels; `None` covers the whole image.
    free_box: Option<(f64, f64)>,
}

impl CropController {
    /// Start with the original aspect, zoom 1 and the image centered.
    pub fn new(natural: Dimensions, viewport: Dimensions) -> Result<Self, CropError> {
        if natural.area() == 0 {
            return Err(CropError::EmptyArea {
                what: "image",
                dims: natural,
            });
        }
        if viewport.area() == 0 {
            return Err(CropError::EmptyArea {
                what: "viewport",
                dims: viewport,
            });
        }
        Ok(Self {
            natural,
            viewport,
            preset: AspectPreset::default(),
            zoom: MIN_ZOOM,
            offset: (0.0, 0.0),
            free_box: None,
        })
    }

    pub fn natural(&self) -> Dimensions {
        self.natural
    }

    pub fn preset(&self) -> AspectPreset {
        self.preset
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Current pan in viewport pixels.
    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    /// Active ratio, if any.
    pub fn aspect(&self) -> Option<f64> {
        self.preset.ratio(self.natural)
    }

    pub fn set_preset(&mut self, preset: AspectPreset) {
        self.preset = preset;
        self.restrict();
    }

    /// Set zoom, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() {
            return;
        }
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.restrict();
    }

    /// Pan the image by a pointer delta in viewport pixels.
    pub fn drag_by(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.offset.0 += dx;
        self.offset.1 += dy;
        self.restrict();
    }

    /// Resize the free-form box (viewport pixels). Clamped to the displayed image.
    pub fn set_free_box(&mut self, width: f64, height: f64) {
        if !width.is_finite() || !height.is_finite() {
            return;
        }
        let (mw, mh) = self.media_size();
        // A sliver image can display thinner than one pixel.
        self.free_box = Some((width.max(1.0).min(mw), height.max(1.0).min(mh)));
        self.restrict();
    }

    /// Viewport pixels per source pixel at zoom 1.
    pub fn display_scale(&self) -> f64 {
        let sx = f64::from(self.viewport.width) / f64::from(self.natural.width);
        let sy = f64::from(self.viewport.height) / f64::from(self.natural.height);
        sx.min(sy)
    }

    /// Displayed image size at zoom 1, in viewport pixels.
    fn media_size(&self) -> (f64, f64) {
        let s = self.display_scale();
        (
            f64::from(self.natural.width) * s,
            f64::from(self.natural.height) * s,
        )
    }

    /// Crop box in viewport pixels.
    pub fn box_size(&self) -> (f64, f64) {
        let media = self.media_size();
        match self.aspect() {
            Some(ratio) => largest_box_with_aspect(media, ratio),
            None => self.free_box.unwrap_or(media),
        }
    }

    /// How far the image may pan before the box would leave it.
    fn max_offset(&self) -> (f64, f64) {
        let (mw, mh) = self.media_size();
        let (bw, bh) = self.box_size();
        (
            ((mw * self.zoom - bw) / 2.0).max(0.0),
            ((mh * self.zoom - bh) / 2.0).max(0.0),
        )
    }

    fn restrict(&mut self) {
        let (max_x, max_y) = self.max_offset();
        self.offset = (
            self.offset.0.clamp(-max_x, max_x),
            self.offset.1.clamp(-max_y, max_y),
        );
    }

    /// The crop box mapped back to source pixels.
    ///
    /// Always inside the image with a positive area. With an aspect
    /// constraint the rectangle carries it as its lock and the side derived
    /// from the other is rounded to the nearest pixel, see
    /// [`CropRect::matches_aspect`].
    pub fn crop_rect(&self) -> CropRect {
        let nw = self.natural.width;
        let nh = self.natural.height;
        let to_source = self.display_scale() * self.zoom;
        let (bw, bh) = self.box_size();
        let (ew, eh) = (bw / to_source, bh / to_source);

        let (width, height) = match self.aspect() {
            Some(ratio) => snap_to_aspect(ew, eh, ratio, self.natural),
            None => (round_edge(ew, nw), round_edge(eh, nh)),
        };

        // Dragging the image right moves the crop left in the source.
        let cx = f64::from(nw) / 2.0 - self.offset.0 / to_source;
        let cy = f64::from(nh) / 2.0 - self.offset.1 / to_source;
        let x = place(cx, width, nw);
        let y = place(cy, height, nh);

        let rect = CropRect::new(x, y, width, height);
        match self.aspect() {
            Some(ratio) => rect.with_aspect(ratio),
            None => rect,
        }
    }
}

fn round_edge(value: f64, limit: u32) -> u32 {
    (value.round() as u32).clamp(1, limit)
}

/// Integer size for an aspect-locked box of extent `(ew, eh)`.
///
/// The shorter side is rounded first and the longer one derived from it,
/// so the derived side is never more than half a pixel off.
fn snap_to_aspect(ew: f64, eh: f64, ratio: f64, natural: Dimensions) -> (u32, u32) {
    let (nw, nh) = (natural.width, natural.height);
    if ratio >= 1.0 {
        let mut height = round_edge(eh, nh);
        let mut width = (f64::from(height) * ratio).round() as u32;
        if width > nw {
            width = nw;
            height = round_edge(f64::from(nw) / ratio, nh);
        }
        (width.max(1), height)
    } else {
        let mut width = round_edge(ew, nw);
        let mut height = (f64::from(width) / ratio).round() as u32;
        if height > nh {
            height = nh;
            width = round_edge(f64::from(nh) * ratio, nw);
        }
        (width, height.max(1))
    }
}

/// Left/top edge for an extent centered on `center`, kept inside `[0, limit]`.
fn place(center: f64, extent: u32, limit: u32) -> u32 {
    let max_start = limit.saturating_sub(extent);
    let start = (center - f64::from(extent) / 2.0).round();
    if start <= 0.0 {
        0
    } else {
        (start as u32).min(max_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn controller(nw: u32, nh: u32, vw: u32, vh: u32) -> CropController {
        CropController::new(Dimensions::new(nw, nh), Dimensions::new(vw, vh)).unwrap()
    }

    #[test]
    fn defaults_to_whole_image() {
        let c = controller(4000, 3000, 800, 600);
        assert_eq!(c.preset(), AspectPreset::Original);
        assert_eq!(
            c.crop_rect(),
            CropRect::new(0, 0, 4000, 3000).with_aspect(4.0 / 3.0)
        );
    }

    #[test]
    fn rejects_empty_image_or_viewport() {
        assert!(CropController::new(Dimensions::new(0, 10), Dimensions::new(10, 10)).is_err());
        assert!(CropController::new(Dimensions::new(10, 10), Dimensions::new(10, 0)).is_err());
    }

    #[test]
    fn display_scale_fits_image_in_viewport() {
        // 4000x3000 in 800x800 → width limits: 0.2
        let c = controller(4000, 3000, 800, 800);
        assert!((c.display_scale() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn square_preset_centered() {
        let mut c = controller(400, 300, 800, 600);
        c.set_preset(AspectPreset::Square);
        assert_eq!(c.crop_rect(), CropRect::new(50, 0, 300, 300).with_aspect(1.0));
    }

    #[test]
    fn zoom_two_halves_the_source_extent() {
        // Display scale 2, square box 600 px → 150 source px at zoom 2
        let mut c = controller(400, 300, 800, 600);
        c.set_preset(AspectPreset::Square);
        c.set_zoom(2.0);
        assert_eq!(c.crop_rect(), CropRect::new(125, 75, 150, 150).with_aspect(1.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut c = controller(400, 300, 800, 600);
        c.set_zoom(10.0);
        assert_eq!(c.zoom(), MAX_ZOOM);
        c.set_zoom(0.2);
        assert_eq!(c.zoom(), MIN_ZOOM);
        c.set_zoom(f64::NAN);
        assert_eq!(c.zoom(), MIN_ZOOM);
    }

    #[test]
    fn drag_moves_crop_opposite_in_source() {
        // Display scale 0.2; at zoom 2 one viewport px is 2.5 source px.
        let mut c = controller(4000, 3000, 800, 600);
        c.set_zoom(2.0);
        let centered = c.crop_rect();
        assert_eq!(
            centered,
            CropRect::new(1000, 750, 2000, 1500).with_aspect(4.0 / 3.0)
        );

        c.drag_by(40.0, -20.0);
        let moved = c.crop_rect();
        assert_eq!(moved.width, 2000);
        assert_eq!(moved.x, 900);
        assert_eq!(moved.y, 800);
    }

    #[test]
    fn drag_is_restricted_to_image() {
        let mut c = controller(4000, 3000, 800, 600);
        c.set_zoom(2.0);
        c.drag_by(10_000.0, 10_000.0);
        let rect = c.crop_rect();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 2000, 1500));
        c.drag_by(-50_000.0, -50_000.0);
        let rect = c.crop_rect();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (2000, 1500, 2000, 1500));
    }

    #[test]
    fn zooming_out_pulls_offset_back_in() {
        let mut c = controller(4000, 3000, 800, 600);
        c.set_zoom(3.0);
        c.drag_by(10_000.0, 0.0);
        c.set_zoom(1.0);
        assert_eq!(c.offset(), (0.0, 0.0));
    }

    #[test]
    fn widescreen_preset_on_landscape() {
        let mut c = controller(1920, 1440, 960, 720);
        c.set_preset(AspectPreset::Widescreen);
        let rect = c.crop_rect();
        assert_eq!(rect.width, 1920);
        assert_eq!(rect.height, 1080);
        assert_eq!(rect.y, 180);
        assert_eq!(rect.aspect, Some(16.0 / 9.0));
    }

    #[test]
    fn free_form_box_follows_user_size() {
        let mut c = controller(1000, 500, 1000, 500);
        c.set_preset(AspectPreset::Free);
        assert_eq!(c.crop_rect(), CropRect::new(0, 0, 1000, 500));
        assert_eq!(c.crop_rect().aspect, None);

        c.set_free_box(300.0, 100.0);
        assert_eq!(c.crop_rect(), CropRect::new(350, 200, 300, 100));

        c.set_free_box(5_000.0, 5_000.0);
        assert_eq!(c.crop_rect(), CropRect::new(0, 0, 1000, 500));
    }

    #[test]
    fn preset_labels_and_serde_names() {
        assert_eq!(AspectPreset::Free.to_string(), "Free form");
        let json = serde_json::to_string(&AspectPreset::Widescreen).unwrap();
        assert_eq!(json, "\"16:9\"");
        let parsed: AspectPreset = serde_json::from_str("\"original\"").unwrap();
        assert_eq!(parsed, AspectPreset::Original);
    }

    fn preset_strategy() -> impl Strategy<Value = AspectPreset> {
        prop::sample::select(AspectPreset::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn crop_rect_always_within_bounds(
            nw in 16u32..6000,
            nh in 16u32..6000,
            vw in 50u32..2000,
            vh in 50u32..2000,
            preset in preset_strategy(),
            zoom in 1.0f64..3.0,
            dx in -5000.0f64..5000.0,
            dy in -5000.0f64..5000.0,
        ) {
            let mut c = CropController::new(Dimensions::new(nw, nh), Dimensions::new(vw, vh)).unwrap();
            c.set_preset(preset);
            c.set_zoom(zoom);
            c.drag_by(dx, dy);
            let rect = c.crop_rect();
            prop_assert!(rect.fits_within(Dimensions::new(nw, nh)), "{rect:?} outside {nw}x{nh}");
            prop_assert!(rect.honors_aspect(), "{rect:?} breaks its own lock");
        }

        #[test]
        fn fixed_presets_keep_their_aspect(
            nw in 64u32..6000,
            nh in 64u32..6000,
            preset in prop::sample::select(vec![
                AspectPreset::Square,
                AspectPreset::Widescreen,
                AspectPreset::Standard,
            ]),
            zoom in 1.0f64..3.0,
        ) {
            let mut c = CropController::new(Dimensions::new(nw, nh), Dimensions::new(800, 600)).unwrap();
            c.set_preset(preset);
            c.set_zoom(zoom);
            let rect = c.crop_rect();
            let ratio = preset.ratio(Dimensions::new(nw, nh)).unwrap();
            prop_assert!(rect.matches_aspect(ratio), "{rect:?} vs {ratio}");
        }
    }
}
