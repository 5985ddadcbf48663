#![forbid(unsafe_code)]

//! Terminal tuning as data.
//!
//! Every constant the terminal core depends on lives in [`TerminalConfig`],
//! which can be loaded from TOML or JSON. Missing fields take the defaults
//! below, so an empty document is a valid configuration.
//!
//! ```toml
//! # replterm.toml
//! flush_delay_ms = 100
//! rows = 200
//! cols = 80
//! realign_threshold_px = 8.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::scroll_sync::ScrollConfig;

/// Errors from loading or validating a [`TerminalConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Tunables for one terminal session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Idle gap (ms) after the last output chunk before the batch is decoded.
    pub flush_delay_ms: u64,
    /// Rows allotted to the terminal widget.
    pub rows: u16,
    /// Columns of the terminal widget.
    pub cols: u16,
    /// Virtual scroll track height (px).
    pub track_height_px: i64,
    /// Bottom-edge band (px) that counts as bottom-aligned on resize.
    pub realign_threshold_px: f64,
    /// Space (px) kept below the last line when bottom-aligned.
    pub bottom_margin_px: f64,
    /// Quiet time (ms) before a viewport resize is applied.
    pub resize_debounce_ms: u64,
    /// Appended to every committed command on the wire.
    pub line_terminator: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            flush_delay_ms: 100,
            rows: 200,
            cols: 80,
            track_height_px: 1_000_000,
            realign_threshold_px: 8.0,
            bottom_margin_px: 0.0,
            resize_debounce_ms: 50,
            line_terminator: "\n".to_string(),
        }
    }
}

impl TerminalConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Read, parse, and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Read, parse, and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// List every out-of-range field. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.flush_delay_ms == 0 {
            errors.push("flush_delay_ms must be > 0".into());
        }
        if self.rows == 0 {
            errors.push("rows must be > 0".into());
        }
        if self.cols == 0 {
            errors.push("cols must be > 0".into());
        }
        if self.track_height_px < 2 {
            errors.push(format!(
                "track_height_px must be >= 2, got {}",
                self.track_height_px
            ));
        }
        if !(self.realign_threshold_px >= 0.0) {
            errors.push(format!(
                "realign_threshold_px must be >= 0, got {}",
                self.realign_threshold_px
            ));
        }
        if !(self.bottom_margin_px >= 0.0) {
            errors.push(format!(
                "bottom_margin_px must be >= 0, got {}",
                self.bottom_margin_px
            ));
        }
        errors
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    #[must_use]
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    #[must_use]
    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    /// Scroll synchronizer settings derived from this config.
    #[must_use]
    pub fn scroll_config(&self) -> ScrollConfig {
        ScrollConfig {
            rows: usize::from(self.rows),
            track_height: self.track_height_px,
            realign_threshold_px: self.realign_threshold_px,
            bottom_margin_px: self.bottom_margin_px,
            resize_debounce: self.resize_debounce(),
        }
    }
}
