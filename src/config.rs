//! Editor settings.
//!
//! The knobs the editing screen exposes, as one serde type. Hosts hand the
//! settings in as TOML or JSON text (the library never reads files itself);
//! every key is optional and unknown keys are rejected to catch typos early.
//!
//! ## Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! format = "jpeg"          # "jpeg", "png" or "webp"
//! quality_percent = 80     # 10-100, step 5 (ignored for PNG)
//! max_size_kb = 500        # 50-5000, step 50
//! aspect = "original"      # "original", "free", "1:1", "16:9" or "4:3"
//! zoom = 1.0               # 1.0-3.0, step 0.1
//! ```
//!
//! ## Layering
//!
//! Settings can be stacked: a host's defaults, then whatever the user last
//! chose. Each layer is sparse and only overrides the keys it names, see
//! [`resolve_settings`].

use crate::crop::{AspectPreset, CropController, MAX_ZOOM, MIN_ZOOM};
use crate::imaging::{CompressionSpec, QUALITY_FLOOR, QUALITY_STEP, Quality, TargetFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_SIZE_KB: u32 = 50;
pub const MAX_SIZE_KB: u32 = 5000;
pub const SIZE_STEP_KB: u32 = 50;
pub const ZOOM_STEP: f64 = 0.1;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Settings validation error: {0}")]
    Validation(String),
}

/// Settings chosen on the editing screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorSettings {
    /// Output container.
    pub format: TargetFormat,
    /// Starting quality for lossy formats.
    pub quality_percent: u32,
    /// Byte budget in KB (1 KB = 1024 bytes).
    pub max_size_kb: u32,
    /// Crop aspect constraint.
    pub aspect: AspectPreset,
    /// Initial zoom for the crop controller.
    pub zoom: f64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            format: TargetFormat::Jpeg,
            quality_percent: 80,
            max_size_kb: 500,
            aspect: AspectPreset::Original,
            zoom: 1.0,
        }
    }
}

impl EditorSettings {
    /// Parse sparse TOML over the defaults and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: EditorSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse sparse JSON over the defaults and validate.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let settings: EditorSettings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check each value is in range and on its step.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(QUALITY_FLOOR..=100).contains(&self.quality_percent)
            || self.quality_percent % QUALITY_STEP != 0
        {
            return Err(ConfigError::Validation(format!(
                "quality_percent must be {QUALITY_FLOOR}-100 in steps of {QUALITY_STEP}, got {}",
                self.quality_percent
            )));
        }
        if !(MIN_SIZE_KB..=MAX_SIZE_KB).contains(&self.max_size_kb)
            || self.max_size_kb % SIZE_STEP_KB != 0
        {
            return Err(ConfigError::Validation(format!(
                "max_size_kb must be {MIN_SIZE_KB}-{MAX_SIZE_KB} in steps of {SIZE_STEP_KB}, got {}",
                self.max_size_kb
            )));
        }
        if !self.zoom.is_finite() || !(MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom) {
            return Err(ConfigError::Validation(format!(
                "zoom must be {MIN_ZOOM:.1}-{MAX_ZOOM:.1}, got {}",
                self.zoom
            )));
        }
        let steps = self.zoom / ZOOM_STEP;
        if (steps - steps.round()).abs() > 1e-6 {
            return Err(ConfigError::Validation(format!(
                "zoom must be a multiple of {ZOOM_STEP}, got {}",
                self.zoom
            )));
        }
        Ok(())
    }

    /// What the encoder should aim for.
    pub fn to_compression_spec(&self) -> CompressionSpec {
        CompressionSpec {
            format: self.format,
            quality: Quality::new(self.quality_percent),
            max_size_bytes: u64::from(self.max_size_kb) * 1024,
        }
    }

    /// Apply the aspect preset and zoom to a crop controller.
    pub fn apply_to(&self, controller: &mut CropController) {
        controller.set_preset(self.aspect);
        controller.set_zoom(self.zoom);
    }
}

/// The stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EditorSettings::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Stack sparse TOML layers over the stock defaults, later layers winning,
/// then deserialize and validate the result.
pub fn resolve_settings(layers: &[&str]) -> Result<EditorSettings, ConfigError> {
    let mut merged = stock_defaults_value()?;
    for layer in layers {
        let overlay: toml::Value = toml::from_str(layer)?;
        merged = merge_toml(merged, overlay);
    }
    let settings: EditorSettings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// A fully commented settings file with every key at its default.
pub fn stock_settings_toml() -> &'static str {
    r##"# Pixel Press editor settings
# ===========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.

# Output format: "jpeg", "png" or "webp".
# PNG is lossless: quality is ignored and only downscaling shrinks it.
format = "jpeg"

# Starting quality for JPEG/WebP, 10-100 in steps of 5.
# The encoder lowers it (down to 10) until the file fits max_size_kb.
quality_percent = 80

# Target maximum file size in KB (1 KB = 1024 bytes), 50-5000 in steps of 50.
# If even quality 10 is too large the image is downscaled as a last resort.
max_size_kb = 500

# Crop aspect: "original" (the image's own), "free", "1:1", "16:9" or "4:3".
aspect = "original"

# Initial crop zoom, 1.0-3.0 in steps of 0.1.
zoom = 1.0
"##
}
