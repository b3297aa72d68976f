//! Display handles for previewing image bytes.
//!
//! A front end shows the source and the processed image by reference: it
//! asks for a handle, renders whatever the handle's URL points at, and drops
//! the handle when the image leaves the screen. The registry tracks which
//! handles are alive so a session can prove nothing leaks across
//! select/process/reset cycles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Shared {
    next_id: AtomicU64,
    live: Mutex<BTreeMap<u64, String>>,
}

impl Shared {
    /// The map stays consistent across a panic, so poisoning is ignored.
    fn live(&self) -> MutexGuard<'_, BTreeMap<u64, String>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const URL_PREFIX: &str = "blob:pixel-press/";

/// Hands out [`DisplayHandle`]s and counts the ones still alive.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    shared: Arc<Shared>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new handle. `label` is a human readable hint (a file name).
    pub fn acquire(&self, label: &str) -> DisplayHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared.live().insert(id, label.to_string());
        log::debug!("display handle {id} acquired for {label}");
        DisplayHandle {
            id,
            label: label.to_string(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of handles not yet dropped.
    pub fn live_count(&self) -> usize {
        self.shared.live().len()
    }

    /// Labels of live handles, oldest first.
    pub fn live_labels(&self) -> Vec<String> {
        self.shared.live().values().cloned().collect()
    }

    /// Label behind a [`DisplayHandle::url`], while that handle is alive.
    pub fn resolve(&self, url: &str) -> Option<String> {
        let id = url.strip_prefix(URL_PREFIX)?.parse::<u64>().ok()?;
        self.shared.live().get(&id).cloned()
    }
}

/// A live reference to displayable image bytes. Released on drop.
#[derive(Debug)]
pub struct DisplayHandle {
    id: u64,
    label: String,
    shared: Arc<Shared>,
}

impl DisplayHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Opaque URL; [`HandleRegistry::resolve`] maps it back while the
    /// handle lives.
    pub fn url(&self) -> String {
        format!("{URL_PREFIX}{}", self.id)
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.shared.live().remove(&self.id);
        log::debug!("display handle {} released", self.id);
    }
}
