//! Review screen text and report.
//!
//! # Output Format
//!
//! ```text
//! Original: photo.jpg
//!     Size: 2.41 MB (image/jpeg)
//! Processed: cropped.jpg
//!     Size: 412.3 KB (image/jpeg)
//!     Dimensions: 2000x1500
//!     Quality: 80
//!     Budget: 500 KB (met)
//! Saved 83.3%
//! ```
//!
//! # Architecture
//!
//! [`format_review`] returns `Vec<String>` for testability and
//! [`print_review`] writes it to stdout. [`ReviewReport`] carries the same
//! facts as JSON for hosts that render their own screen.

use crate::session::{ProcessedImage, SourceImage};
use serde::Serialize;

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size in 1024-based units with at most two decimals.
///
/// ```
/// # use pixel_press::output::format_size;
/// assert_eq!(format_size(0), "0 Bytes");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(512_000), "500 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(value), UNITS[unit])
}

/// Two decimals, trailing zeros dropped.
fn trim_decimals(value: f64) -> String {
    let fixed = format!("{value:.2}");
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Percent saved going from `original` to `processed` bytes.
///
/// Negative when the output grew. Zero for an empty original.
pub fn size_reduction_percent(original: u64, processed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - processed as f64) / original as f64 * 100.0
}

/// Before/after facts for one processed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewReport {
    pub source_name: String,
    pub source_mime_type: String,
    pub source_size: u64,
    pub output_name: String,
    pub output_mime_type: String,
    pub output_size: u64,
    pub width: u32,
    pub height: u32,
    pub quality: Option<u32>,
    pub max_size_bytes: u64,
    pub budget_met: bool,
    pub reduction_percent: f64,
}

impl ReviewReport {
    pub fn new(source: &SourceImage, processed: &ProcessedImage) -> Self {
        Self {
            source_name: source.name.clone(),
            source_mime_type: source.mime_type.clone(),
            source_size: source.size(),
            output_name: processed.name.clone(),
            output_mime_type: processed.mime_type().to_string(),
            output_size: processed.size(),
            width: processed.dimensions.width,
            height: processed.dimensions.height,
            quality: processed.quality.map(|q| q.value()),
            max_size_bytes: processed.max_size_bytes,
            budget_met: processed.budget_met,
            reduction_percent: size_reduction_percent(source.size(), processed.size()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub fn format_review(source: &SourceImage, processed: &ProcessedImage) -> Vec<String> {
    let mut lines = vec![
        format!("Original: {}", source.name),
        format!(
            "    Size: {} ({})",
            format_size(source.size()),
            source.mime_type
        ),
        format!("Processed: {}", processed.name),
        format!(
            "    Size: {} ({})",
            format_size(processed.size()),
            processed.mime_type()
        ),
        format!("    Dimensions: {}", processed.dimensions),
    ];
    if let Some(quality) = processed.quality {
        lines.push(format!("    Quality: {}", quality.value()));
    }
    lines.push(format!(
        "    Budget: {} ({})",
        format_size(processed.max_size_bytes),
        if processed.budget_met { "met" } else { "exceeded" }
    ));

    let reduction = size_reduction_percent(source.size(), processed.size());
    if reduction >= 0.0 {
        lines.push(format!("Saved {reduction:.1}%"));
    } else {
        lines.push(format!("Grew {:.1}%", -reduction));
    }
    lines
}

pub fn print_review(source: &SourceImage, processed: &ProcessedImage) {
    for line in format_review(source, processed) {
        println!("{}", line);
    }
}
