//! The select → edit → review workflow.
//!
//! A [`Session`] holds at most one source image and at most one processed
//! result, and moves between three states:
//!
//! ```text
//!            select_image            process
//!   Empty ────────────────▶ Editing ─────────▶ Reviewing
//!     ▲                        │                   │
//!     └──────── cancel / reset ┴───────────────────┘
//! ```
//!
//! Transitions called from the wrong state fail with
//! [`SessionError::InvalidState`] and change nothing.
//!
//! ## Concurrency
//!
//! `Session` is `Sync`. [`Session::process`] takes the lock only to check
//! and record that a run is in flight, runs extract + encode unlocked, and
//! takes the lock again to commit. A second `process` while one is in flight
//! fails with [`SessionError::Busy`]. `cancel`/`reset` bump a generation
//! counter: a run that started under an older generation is discarded when it
//! finishes and its caller gets [`SessionError::Cancelled`].
//!
//! Every source and result the session holds has a live
//! [`DisplayHandle`](crate::display::DisplayHandle). Replacing or discarding
//! them drops the handle, so [`Session::live_handles`] returns to zero after
//! a reset.

use crate::crop::{CropController, CropError};
use crate::display::{DisplayHandle, HandleRegistry};
use crate::imaging::{
    CompressionSpec, CropRect, Dimensions, Encoded, ImagingError, Quality, RasterSurface,
    RustSurface, TargetFormat, crop_and_compress, get_dimensions,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error("A processing run is already in flight")]
    Busy,
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("Processing was cancelled before it finished")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::Imaging(ImagingError::InvalidInput(_)) => {
                "The crop area is not valid for this image."
            }
            SessionError::Imaging(_) => "Error processing image.",
            SessionError::InvalidInput(_) => "Please select an image file.",
            SessionError::Crop(_) => "The image cannot be shown for cropping.",
            SessionError::Busy => "Still processing, please wait.",
            SessionError::InvalidState { .. } => "That action is not available right now.",
            SessionError::Cancelled => "Processing was cancelled.",
            SessionError::Io(_) => "Could not read or write the file.",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Where a session is in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Empty,
    Editing,
    Reviewing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Empty => "empty",
            SessionState::Editing => "editing",
            SessionState::Reviewing => "reviewing",
        };
        f.write_str(label)
    }
}

/// The file the user selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file, guessing its MIME type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type_for_path(path), bytes))
    }

    /// Declared as an image (`image/*`). The bytes are not inspected.
    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// MIME type for a file name, by extension.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

/// A committed crop + compress result.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Always `cropped.<ext>`.
    pub name: String,
    pub format: TargetFormat,
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
    /// Quality of the final encoding; `None` for PNG.
    pub quality: Option<Quality>,
    pub budget_met: bool,
    pub max_size_bytes: u64,
    pub attempts: u32,
}

impl ProcessedImage {
    fn from_encoded(encoded: Encoded, spec: &CompressionSpec) -> Self {
        Self {
            name: encoded.format.output_file_name(),
            format: encoded.format,
            dimensions: encoded.dimensions,
            quality: encoded.quality,
            budget_met: encoded.budget_met,
            max_size_bytes: spec.max_size_bytes,
            attempts: encoded.attempts,
            bytes: encoded.bytes,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Write the bytes to `dir/<name>` and return the path.
    pub fn save_into(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

struct Loaded {
    image: Arc<SourceImage>,
    handle: DisplayHandle,
}

struct Committed {
    image: Arc<ProcessedImage>,
    handle: DisplayHandle,
}

enum Phase {
    Empty,
    Editing(Loaded),
    Reviewing(Loaded, Committed),
}

impl Phase {
    fn state(&self) -> SessionState {
        match self {
            Phase::Empty => SessionState::Empty,
            Phase::Editing(_) => SessionState::Editing,
            Phase::Reviewing(..) => SessionState::Reviewing,
        }
    }

    fn loaded(&self) -> Option<&Loaded> {
        match self {
            Phase::Empty => None,
            Phase::Editing(loaded) | Phase::Reviewing(loaded, _) => Some(loaded),
        }
    }
}

struct Inner {
    phase: Phase,
    /// Bumped by cancel/reset; runs from an older generation are stale.
    generation: u64,
    in_flight: Option<u64>,
}

/// A processing run that has passed the busy/state checks.
struct Ticket {
    source: Arc<SourceImage>,
    generation: u64,
}

/// One image's trip through crop and compress.
pub struct Session<S: RasterSurface = RustSurface> {
    surface: S,
    handles: HandleRegistry,
    inner: Mutex<Inner>,
}

impl Session<RustSurface> {
    pub fn new() -> Self {
        Self::with_surface(RustSurface::new())
    }
}

impl Default for Session<RustSurface> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RasterSurface> Session<S> {
    pub fn with_surface(surface: S) -> Self {
        Self {
            surface,
            handles: HandleRegistry::new(),
            inner: Mutex::new(Inner {
                phase: Phase::Empty,
                generation: 0,
                in_flight: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn state(&self) -> SessionState {
        self.lock().phase.state()
    }

    pub fn is_processing(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    pub fn source(&self) -> Option<Arc<SourceImage>> {
        self.lock().phase.loaded().map(|l| Arc::clone(&l.image))
    }

    pub fn processed(&self) -> Option<Arc<ProcessedImage>> {
        match &self.lock().phase {
            Phase::Reviewing(_, committed) => Some(Arc::clone(&committed.image)),
            _ => None,
        }
    }

    /// Display URL of the source image, while one is loaded.
    pub fn source_url(&self) -> Option<String> {
        self.lock().phase.loaded().map(|l| l.handle.url())
    }

    /// Display URL of the processed image, while reviewing.
    pub fn processed_url(&self) -> Option<String> {
        match &self.lock().phase {
            Phase::Reviewing(_, committed) => Some(committed.handle.url()),
            _ => None,
        }
    }

    /// Display handles currently alive.
    pub fn live_handles(&self) -> usize {
        self.handles.live_count()
    }

    /// Load `image` and start editing. Only from `Empty`.
    pub fn select_image(&self, image: SourceImage) -> Result<()> {
        let mut inner = self.lock();
        let state = inner.phase.state();
        if state != SessionState::Empty {
            return Err(SessionError::InvalidState {
                operation: "select an image",
                state,
            });
        }
        if !image.is_image() {
            return Err(SessionError::InvalidInput(format!(
                "{} is {}, not an image",
                image.name, image.mime_type
            )));
        }

        log::info!(
            "selected {} ({}, {} bytes)",
            image.name,
            image.mime_type,
            image.size()
        );
        let handle = self.handles.acquire(&image.name);
        inner.phase = Phase::Editing(Loaded {
            image: Arc::new(image),
            handle,
        });
        Ok(())
    }

    /// Crop controller for the loaded image shown in `viewport`.
    pub fn crop_controller(&self, viewport: Dimensions) -> Result<CropController> {
        let source = self
            .source()
            .ok_or(SessionError::InvalidState {
                operation: "crop",
                state: SessionState::Empty,
            })?;
        let natural = get_dimensions(&self.surface, &source.bytes)?;
        Ok(CropController::new(natural, viewport)?)
    }

    /// Crop and compress the loaded image, then move to `Reviewing`.
    ///
    /// On failure the session stays in `Editing` with nothing committed.
    pub fn process(&self, rect: CropRect, spec: &CompressionSpec) -> Result<Arc<ProcessedImage>> {
        let ticket = self.begin()?;
        let outcome = crop_and_compress(&self.surface, &ticket.source.bytes, rect, spec);
        self.finish(ticket, outcome, spec)
    }

    /// [`process`](Self::process) on the rayon pool.
    ///
    /// The busy and state checks happen before this returns; the outcome
    /// arrives on the returned channel.
    pub fn process_in_background(
        self: &Arc<Self>,
        rect: CropRect,
        spec: CompressionSpec,
    ) -> Result<Receiver<Result<Arc<ProcessedImage>>>>
    where
        S: Send + 'static,
    {
        let ticket = self.begin()?;
        let (tx, rx) = mpsc::channel();
        let session = Arc::clone(self);
        rayon::spawn(move || {
            let outcome = crop_and_compress(&session.surface, &ticket.source.bytes, rect, &spec);
            // The receiver may be gone; the session state is still updated.
            let _ = tx.send(session.finish(ticket, outcome, &spec));
        });
        Ok(rx)
    }

    fn begin(&self) -> Result<Ticket> {
        let mut inner = self.lock();
        if inner.in_flight.is_some() {
            return Err(SessionError::Busy);
        }
        let source = match &inner.phase {
            Phase::Editing(loaded) => Arc::clone(&loaded.image),
            other => {
                return Err(SessionError::InvalidState {
                    operation: "process",
                    state: other.state(),
                });
            }
        };
        let generation = inner.generation;
        inner.in_flight = Some(generation);
        Ok(Ticket { source, generation })
    }

    fn finish(
        &self,
        ticket: Ticket,
        outcome: std::result::Result<Encoded, ImagingError>,
        spec: &CompressionSpec,
    ) -> Result<Arc<ProcessedImage>> {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            log::warn!(
                "discarding result for {}: session was cancelled",
                ticket.source.name
            );
            return Err(SessionError::Cancelled);
        }
        inner.in_flight = None;

        let encoded = outcome?;
        let processed = Arc::new(ProcessedImage::from_encoded(encoded, spec));
        let handle = self.handles.acquire(&processed.name);

        let phase = std::mem::replace(&mut inner.phase, Phase::Empty);
        inner.phase = match phase {
            Phase::Editing(loaded) => Phase::Reviewing(
                loaded,
                Committed {
                    image: Arc::clone(&processed),
                    handle,
                },
            ),
            // Only Editing can hold an in-flight run of the current generation.
            other => other,
        };

        log::info!(
            "processed {} → {} ({}, {} bytes)",
            ticket.source.name,
            processed.name,
            processed.dimensions,
            processed.size()
        );
        Ok(processed)
    }

    /// Discard everything and return to `Empty`. A no-op when already empty.
    pub fn cancel(&self) {
        self.clear("cancel");
    }

    /// Same as [`cancel`](Self::cancel); offered for the "start over" action.
    pub fn reset(&self) {
        self.clear("reset");
    }

    fn clear(&self, reason: &str) {
        let discarded = {
            let mut inner = self.lock();
            if matches!(inner.phase, Phase::Empty) && inner.in_flight.is_none() {
                return;
            }
            inner.generation += 1;
            inner.in_flight = None;
            std::mem::replace(&mut inner.phase, Phase::Empty)
        };
        log::info!("{reason}: session back to empty");
        drop(discarded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockSurface;
    use crate::imaging::BackendError;
    use image::DynamicImage;
    use std::thread;

    fn jpeg_source() -> SourceImage {
        SourceImage::new("photo.jpg", "image/jpeg", vec![1, 2, 3])
    }

    fn mock_session() -> Session<MockSurface> {
        Session::with_surface(MockSurface::new(400, 300))
    }

    // =========================================================================
    // select_image
    // =========================================================================

    #[test]
    fn select_moves_to_editing_and_acquires_handle() {
        let session = mock_session();
        assert_eq!(session.state(), SessionState::Empty);

        session.select_image(jpeg_source()).unwrap();

        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(session.live_handles(), 1);
        assert_eq!(session.source().unwrap().name, "photo.jpg");
        assert!(session.source_url().unwrap().starts_with("blob:"));
    }

    #[test]
    fn select_rejects_non_images() {
        let session = mock_session();
        let err = session
            .select_image(SourceImage::new("notes.txt", "text/plain", b"hi".to_vec()))
            .unwrap_err();

        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert_eq!(err.user_message(), "Please select an image file.");
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.live_handles(), 0);
    }

    #[test]
    fn select_twice_is_invalid_state() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();
        let err = session.select_image(jpeg_source()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                state: SessionState::Editing,
                ..
            }
        ));
        assert_eq!(session.live_handles(), 1);
    }

    // =========================================================================
    // process
    // =========================================================================

    #[test]
    fn process_commits_result() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();

        let out = session
            .process(CropRect::new(0, 0, 200, 150), &CompressionSpec::default())
            .unwrap();

        assert_eq!(session.state(), SessionState::Reviewing);
        assert_eq!(out.name, "cropped.jpg");
        assert_eq!(out.mime_type(), "image/jpeg");
        assert_eq!(out.dimensions, Dimensions::new(200, 150));
        assert_eq!(out.size(), 200 * 150 * 80 / 100);
        assert!(out.budget_met);
        assert_eq!(session.processed().unwrap(), out);
        assert_eq!(session.live_handles(), 2);
        assert_ne!(session.source_url(), session.processed_url());
    }

    #[test]
    fn process_from_empty_is_invalid_state() {
        let session = mock_session();
        let err = session
            .process(CropRect::new(0, 0, 1, 1), &CompressionSpec::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                operation: "process",
                state: SessionState::Empty
            }
        ));
    }

    #[test]
    fn process_from_reviewing_is_invalid_state() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();
        let rect = CropRect::new(0, 0, 10, 10);
        session.process(rect, &CompressionSpec::default()).unwrap();

        let err = session.process(rect, &CompressionSpec::default()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(err.to_string(), "Cannot process while reviewing");
    }

    #[test]
    fn failed_process_stays_editing() {
        let session = Session::with_surface(MockSurface::new(400, 300).failing_encode());
        session.select_image(jpeg_source()).unwrap();

        let err = session
            .process(CropRect::new(0, 0, 100, 100), &CompressionSpec::default())
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Imaging(ImagingError::EncodingFailed(_))
        ));
        assert_eq!(err.user_message(), "Error processing image.");
        assert_eq!(session.state(), SessionState::Editing);
        assert!(session.processed().is_none());
        assert!(!session.is_processing());
        assert_eq!(session.live_handles(), 1);
    }

    #[test]
    fn out_of_bounds_rect_is_invalid_input() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();

        let err = session
            .process(CropRect::new(300, 0, 200, 100), &CompressionSpec::default())
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Imaging(ImagingError::InvalidInput(_))
        ));
        assert_eq!(session.state(), SessionState::Editing);
    }

    #[test]
    fn rect_breaking_its_aspect_lock_is_invalid_input() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();
        let mut controller = session.crop_controller(Dimensions::new(800, 600)).unwrap();
        controller.set_preset(crate::crop::AspectPreset::Square);
        let stretched = CropRect {
            width: 200,
            height: 100,
            ..controller.crop_rect()
        };

        let err = session
            .process(stretched, &CompressionSpec::default())
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Imaging(ImagingError::InvalidInput(_))
        ));
        assert_eq!(session.state(), SessionState::Editing);
        assert!(session.processed().is_none());
    }

    #[test]
    fn background_process_delivers_over_channel() {
        let session = Arc::new(mock_session());
        session.select_image(jpeg_source()).unwrap();

        let rx = session
            .process_in_background(CropRect::new(0, 0, 40, 30), CompressionSpec::default())
            .unwrap();
        let out = rx.recv().unwrap().unwrap();

        assert_eq!(out.dimensions, Dimensions::new(40, 30));
        assert_eq!(session.state(), SessionState::Reviewing);
    }

    // =========================================================================
    // cancel / reset
    // =========================================================================

    #[test]
    fn cancel_from_empty_is_noop() {
        let session = mock_session();
        session.cancel();
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.live_handles(), 0);
    }

    #[test]
    fn reset_releases_all_handles() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();
        session
            .process(CropRect::new(0, 0, 10, 10), &CompressionSpec::default())
            .unwrap();
        assert_eq!(session.live_handles(), 2);

        session.reset();

        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.live_handles(), 0);
        assert!(session.source().is_none());
        assert!(session.processed().is_none());
    }

    #[test]
    fn repeated_cycles_do_not_leak_handles() {
        let session = mock_session();
        for _ in 0..5 {
            session.select_image(jpeg_source()).unwrap();
            session
                .process(CropRect::new(0, 0, 10, 10), &CompressionSpec::default())
                .unwrap();
            session.cancel();
        }
        assert_eq!(session.live_handles(), 0);
    }

    // =========================================================================
    // crop_controller
    // =========================================================================

    #[test]
    fn crop_controller_uses_source_dimensions() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();
        let controller = session.crop_controller(Dimensions::new(800, 600)).unwrap();
        assert_eq!(controller.natural(), Dimensions::new(400, 300));
        assert_eq!(
            controller.crop_rect(),
            CropRect::new(0, 0, 400, 300).with_aspect(4.0 / 3.0)
        );
    }

    #[test]
    fn crop_controller_rejects_empty_viewport() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();

        let err = session.crop_controller(Dimensions::new(0, 0)).unwrap_err();

        assert!(matches!(err, SessionError::Crop(CropError::EmptyArea { .. })));
        assert_eq!(err.user_message(), "The image cannot be shown for cropping.");
        assert_eq!(session.state(), SessionState::Editing);
    }

    #[test]
    fn crop_controller_needs_a_source() {
        let session = mock_session();
        assert!(matches!(
            session.crop_controller(Dimensions::new(800, 600)),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn crop_controller_reports_undecodable_source() {
        let session = Session::with_surface(MockSurface::new(400, 300).failing_decode());
        session.select_image(jpeg_source()).unwrap();
        assert!(matches!(
            session.crop_controller(Dimensions::new(800, 600)),
            Err(SessionError::Imaging(ImagingError::ExtractionFailed(_)))
        ));
    }

    // =========================================================================
    // concurrency
    // =========================================================================

    /// Blocks in `decode` until released, so a run can be held in flight.
    struct GatedSurface {
        inner: MockSurface,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl RasterSurface for GatedSurface {
        fn identify(&self, bytes: &[u8]) -> std::result::Result<Dimensions, BackendError> {
            self.inner.identify(bytes)
        }

        fn decode(&self, bytes: &[u8]) -> std::result::Result<DynamicImage, BackendError> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            self.inner.decode(bytes)
        }

        fn draw(
            &self,
            source: &DynamicImage,
            src: CropRect,
            dst: Dimensions,
        ) -> std::result::Result<DynamicImage, BackendError> {
            self.inner.draw(source, src, dst)
        }

        fn encode(
            &self,
            raster: &DynamicImage,
            format: TargetFormat,
            quality: Quality,
        ) -> std::result::Result<Vec<u8>, BackendError> {
            self.inner.encode(raster, format, quality)
        }
    }

    fn gated_session() -> (Arc<Session<GatedSurface>>, Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let session = Arc::new(Session::with_surface(GatedSurface {
            inner: MockSurface::new(400, 300),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        }));
        session.select_image(jpeg_source()).unwrap();
        (session, entered_rx, release_tx)
    }

    #[test]
    fn second_process_is_busy_and_first_commits() {
        let (session, entered, release) = gated_session();
        let rect = CropRect::new(0, 0, 100, 100);

        let worker = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.process(rect, &CompressionSpec::default()))
        };
        entered.recv().unwrap();

        let second = session.process(CropRect::new(0, 0, 50, 50), &CompressionSpec::default());
        assert!(matches!(second, Err(SessionError::Busy)));
        assert!(session.is_processing());

        release.send(()).unwrap();
        let first = worker.join().unwrap().unwrap();

        assert_eq!(session.state(), SessionState::Reviewing);
        assert_eq!(session.processed().unwrap().dimensions, first.dimensions);
        assert_eq!(first.dimensions, Dimensions::new(100, 100));
    }

    #[test]
    fn cancel_during_process_discards_result() {
        let (session, entered, release) = gated_session();

        let worker = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                session.process(CropRect::new(0, 0, 100, 100), &CompressionSpec::default())
            })
        };
        entered.recv().unwrap();

        session.cancel();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(!session.is_processing());

        release.send(()).unwrap();
        let outcome = worker.join().unwrap();

        assert!(matches!(outcome, Err(SessionError::Cancelled)));
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.processed().is_none());
        assert_eq!(session.live_handles(), 0);
    }

    #[test]
    fn stale_run_does_not_block_new_session() {
        let (session, entered, release) = gated_session();

        let worker = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                session.process(CropRect::new(0, 0, 100, 100), &CompressionSpec::default())
            })
        };
        entered.recv().unwrap();
        session.cancel();
        session.select_image(jpeg_source()).unwrap();

        release.send(()).unwrap();
        assert!(matches!(
            worker.join().unwrap(),
            Err(SessionError::Cancelled)
        ));
        assert_eq!(session.state(), SessionState::Editing);
        assert!(!session.is_processing());
    }

    // =========================================================================
    // SourceImage / ProcessedImage
    // =========================================================================

    #[test]
    fn mime_type_guessed_from_extension() {
        assert_eq!(mime_type_for_path(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("x.webp")), "image/webp");
        assert_eq!(mime_type_for_path(Path::new("x.tiff")), "image/tiff");
        assert_eq!(
            mime_type_for_path(Path::new("notes.txt")),
            "application/octet-stream"
        );
        assert_eq!(
            mime_type_for_path(Path::new("README")),
            "application/octet-stream"
        );
    }

    #[test]
    fn source_from_path_reads_bytes_and_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("shot.png");
        std::fs::write(&path, [9u8, 8, 7]).unwrap();

        let source = SourceImage::from_path(&path).unwrap();
        assert_eq!(source.name, "shot.png");
        assert_eq!(source.mime_type, "image/png");
        assert_eq!(source.bytes, vec![9, 8, 7]);
        assert!(source.is_image());
    }

    #[test]
    fn save_into_writes_named_file() {
        let session = mock_session();
        session.select_image(jpeg_source()).unwrap();
        let out = session
            .process(
                CropRect::new(0, 0, 10, 10),
                &CompressionSpec {
                    format: TargetFormat::WebP,
                    ..CompressionSpec::default()
                },
            )
            .unwrap();

        let tmp = tempfile::TempDir::new().unwrap();
        let path = out.save_into(&tmp.path().join("downloads")).unwrap();

        assert_eq!(path.file_name().unwrap(), "cropped.webp");
        assert_eq!(std::fs::read(path).unwrap(), out.bytes);
    }
}
