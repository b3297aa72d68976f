//! # Pixel Press
//!
//! Crop an image, then re-encode it under a file size budget, entirely on
//! the local machine. The library is the engine behind a
//! "select → edit → download" screen: a host (desktop UI, WASM page, test
//! harness) feeds it a file and gestures and gets back the finished bytes.
//!
//! # Architecture: Crop Then Compress
//!
//! ```text
//! file ─▶ Session::select_image
//!           │
//!           ▼
//!        CropController   drag / zoom / aspect  ─▶  CropRect (source pixels)
//!           │
//!           ▼
//!        Session::process ─▶ extract (1:1 copy) ─▶ encode (quality ladder,
//!           │                                       then downscale)
//!           ▼
//!        ProcessedImage  "cropped.jpg", bytes, size, budget met?
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Raster surface trait, pixel-exact crop, size-constrained encode |
//! | [`crop`] | Viewport gestures → source-pixel crop rectangle |
//! | [`session`] | Empty / Editing / Reviewing state machine, `Busy` and cancellation |
//! | [`display`] | Display handles for previews, released on drop |
//! | [`config`] | Editor settings: defaults, validation, TOML/JSON parsing |
//! | [`output`] | Review screen text, size formatting, JSON report |
//!
//! # Design Decisions
//!
//! ## Budget Is a Goal, Not a Contract
//!
//! A byte budget can be unreachable (a 16 px noise image will not fit in
//! 50 bytes). Instead of failing, the encoder returns the smallest file it
//! managed and sets `budget_met = false`, logging a warning. The review
//! screen shows the overshoot; the user decides.
//!
//! ## Quality Before Pixels
//!
//! Lowering quality costs less visually than losing resolution, so the
//! encoder walks quality down in steps of 5 to a floor of 10 first and only
//! then shrinks the raster by 10% per step. PNG has no quality knob and goes
//! straight to shrinking.
//!
//! ## One Pixel Backend Behind a Trait
//!
//! All pixel work goes through [`imaging::RasterSurface`]. The production
//! [`imaging::RustSurface`] uses the `image` crate plus `webp` for lossy WebP;
//! tests swap in a recording mock whose encoded sizes follow a formula, so
//! the search can be asserted exactly without real codecs.
//!
//! ## Logging
//!
//! The crate logs through the `log` facade and never installs a logger.

pub mod config;
pub mod crop;
pub mod display;
pub mod imaging;
pub mod output;
pub mod session;

pub use session::{ProcessedImage, Session, SessionError, SessionState, SourceImage};
