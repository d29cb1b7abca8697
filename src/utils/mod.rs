//! Utility functions and helpers.
//!
//! # Submodules
//!
//! - [`hash`]: Streaming MD5 content hashes
//! - [`logger`]: Diagnostic logging setup
//! - [`paths`]: Path manipulation
//! - [`serialization`]: Human-readable JSON documents
//!
//! # Examples
//!
//! ```
//! use pathmanifest::utils::{format_size, parse_truthy};
//!
//! assert_eq!(format_size(1024 * 1024), "1.00 MB");
//! assert_eq!(parse_truthy("yes"), Some(true));
//! ```

/// Content hashing
pub mod hash;
/// Diagnostic logging setup
pub mod logger;
/// Path manipulation and resolution utilities
pub mod paths;
/// JSON serialization utilities
pub mod serialization;

/// Formats a file size in bytes into a human-readable string with appropriate units.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size.round() as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Interprets common boolean spellings used in environment variables.
#[must_use]
pub fn parse_truthy(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
