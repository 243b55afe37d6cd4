#![forbid(unsafe_code)]

//! Board configuration as data.
//!
//! [`BoardConfig`] gathers every tunable the board reads, and can be loaded
//! from TOML or JSON so hosts can ship behaviour changes without rebuilding.
//!
//! # Loading
//!
//! ```toml
//! # blockgrid.toml
//! allowOverlap = false
//! dragReflow = "push-away"
//!
//! [grid]
//! columns = 12
//! rowHeight = 60
//! gap = 8
//! ```
//!
//! ```rust,ignore
//! let config = BoardConfig::from_toml_file("blockgrid.toml")?;
//! let config = BoardConfig::from_json_str(r#"{ "lassoSelection": false }"#)?;
//! ```
//!
//! # Defaults
//!
//! Every field has a default, so `BoardConfig::default()` is a 12-column
//! unbounded grid with lasso, keyboard move/delete, and no reflow.

use std::path::Path;

use blockgrid_core::gesture::{DEFAULT_DRAG_THRESHOLD, DEFAULT_RESIZE_HANDLE_SIZE, GestureConfig};
use blockgrid_layout::{ArrangeStrategy, GridConfig, ReflowMode};
use serde::{Deserialize, Serialize};

/// Default FLIP duration for arrange and drop transitions.
pub const DEFAULT_ARRANGE_ANIMATION_MS: u64 = 300;

/// Default undo depth.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Top-level board configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardConfig {
    /// Grid geometry.
    pub grid: GridConfig,
    /// Permit overlapping footprints.
    pub allow_overlap: bool,
    /// Rubber-band selection on empty canvas.
    pub lasso_selection: bool,
    /// Arrow-key nudging of the selection.
    pub keyboard_move: bool,
    /// Delete/Backspace removes the selection.
    pub keyboard_delete: bool,
    /// Grow a bounded grid's row count instead of rejecting placements below it.
    pub auto_grow_rows: bool,
    /// Collision resolution for drags.
    pub drag_reflow: ReflowMode,
    /// Re-arrange the board after every add/remove.
    pub auto_arrange: bool,
    /// Strategy used by auto-arrange.
    pub auto_arrange_strategy: ArrangeStrategy,
    /// FLIP duration in milliseconds.
    pub arrange_animation_ms: u64,
    /// Dropping a drag outside the container removes the dragged blocks.
    pub drag_out: bool,
    /// Maximum undo entries.
    pub history_limit: usize,
    /// Pointer travel in pixels before a press becomes a drag.
    pub drag_threshold: f64,
    /// Resize handle band width in pixels.
    pub resize_handle_size: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            allow_overlap: false,
            lasso_selection: true,
            keyboard_move: true,
            keyboard_delete: true,
            auto_grow_rows: false,
            drag_reflow: ReflowMode::None,
            auto_arrange: false,
            auto_arrange_strategy: ArrangeStrategy::TopLeft,
            arrange_animation_ms: DEFAULT_ARRANGE_ANIMATION_MS,
            drag_out: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
            resize_handle_size: DEFAULT_RESIZE_HANDLE_SIZE,
        }
    }
}

impl BoardConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(err) = self.grid.validate() {
            errors.push(format!("grid: {err}"));
        }
        if self.history_limit == 0 {
            errors.push("historyLimit must be > 0".into());
        }
        if !(self.drag_threshold.is_finite() && self.drag_threshold >= 0.0) {
            errors.push(format!(
                "dragThreshold must be >= 0, got {}",
                self.drag_threshold
            ));
        }
        if !(self.resize_handle_size.is_finite() && self.resize_handle_size >= 0.0) {
            errors.push(format!(
                "resizeHandleSize must be >= 0, got {}",
                self.resize_handle_size
            ));
        }

        errors
    }

    /// Validate, converting a non-empty error list into [`ConfigError`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Gesture thresholds derived from this configuration.
    #[must_use]
    pub fn gesture(&self) -> GestureConfig {
        GestureConfig {
            drag_threshold: self.drag_threshold,
            resize_handle_size: self.resize_handle_size,
        }
    }

    #[must_use]
    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    #[must_use]
    pub fn with_drag_reflow(mut self, mode: ReflowMode) -> Self {
        self.drag_reflow = mode;
        self
    }

    #[must_use]
    pub fn with_allow_overlap(mut self, allow: bool) -> Self {
        self.allow_overlap = allow;
        self
    }
}

/// Errors from loading or validating a [`BoardConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// TOML serialization error.
    TomlSerialize(toml::ser::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::TomlSerialize(e) => write!(f, "TOML serialize error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::TomlSerialize(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
