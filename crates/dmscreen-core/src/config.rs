//! Configuration for the layout engine and the session.

use crate::snap::GRID_SIZE;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Minimum clearance kept between module rectangles.
pub const COLLISION_GAP: f64 = 10.0;
/// Number of rings the spiral fallback search scans before giving up.
pub const COLLISION_MAX_RADIUS: u32 = 20;
/// Smallest size a module can be resized to.
pub const MIN_MODULE_SIZE: Size = Size::new(150.0, 100.0);
/// Largest size a module can be resized to.
pub const MAX_MODULE_SIZE: Size = Size::new(800.0, 800.0);
/// Default interval between persistence flushes.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parameters of the placement and collision engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Snap quantum in canvas units.
    pub grid_size: f64,
    /// Clearance enforced between module rectangles.
    pub gap: f64,
    /// Ring count for the spiral fallback search.
    pub max_radius: u32,
    /// Lower bound for module sizes.
    pub min_size: Size,
    /// Upper bound for module sizes.
    pub max_size: Size,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            gap: COLLISION_GAP,
            max_radius: COLLISION_MAX_RADIUS,
            min_size: MIN_MODULE_SIZE,
            max_size: MAX_MODULE_SIZE,
        }
    }
}

impl LayoutConfig {
    /// Check the values the resolver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.grid_size.is_finite() || self.grid_size <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "grid_size must be a positive number, got {}",
                self.grid_size
            )));
        }
        if !self.gap.is_finite() || self.gap < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gap must be zero or positive, got {}",
                self.gap
            )));
        }
        if self.min_size.width > self.max_size.width || self.min_size.height > self.max_size.height {
            return Err(ConfigError::Invalid(
                "min_size must not exceed max_size".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp a module size into the configured bounds.
    pub fn clamp_size(&self, size: Size) -> Size {
        size.clamp(self.min_size, self.max_size)
    }
}

/// Top-level configuration for a DM Screen session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Layout engine parameters.
    pub layout: LayoutConfig,
    /// Directory for persisted records. `None` uses the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Interval between background persistence flushes.
    pub flush_interval_ms: u64,
    /// Size of the visible canvas area, used to find the screen centre.
    pub viewport_size: Size,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            data_dir: None,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            viewport_size: Size::new(1280.0, 800.0),
        }
    }
}

impl ScreenConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
