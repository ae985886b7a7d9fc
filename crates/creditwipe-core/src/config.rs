//! Studio configuration.
//!
//! Settings are read from a JSON file. Missing fields fall back to their
//! defaults so a config file only needs to name what it changes.

use crate::error::{Result, WipeError};
use crate::params::DEFAULT_INPAINT_RADIUS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of decoded frames kept resident.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Preview viewport width in pixels.
    pub viewport_width: u32,
    /// Preview viewport height in pixels.
    pub viewport_height: u32,
    /// Frame cache capacity (number of frames).
    pub cache_capacity: usize,
    /// Inpaint radius preselected for new render jobs.
    pub default_inpaint_radius: u32,
    /// `tracing` filter directive used when neither `--log` nor `RUST_LOG` is set.
    pub log_filter: String,
    pub export: ExportConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            viewport_width: 720,
            viewport_height: 480,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            default_inpaint_radius: DEFAULT_INPAINT_RADIUS,
            log_filter: "info".to_string(),
            export: ExportConfig::default(),
        }
    }
}

/// Encoder settings for full renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Constant rate factor passed to x264/x265 style encoders.
    pub crf: u8,
    /// Force a specific ffmpeg encoder instead of matching the source codec.
    pub encoder: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            crf: 18,
            encoder: None,
        }
    }
}

impl StudioConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            WipeError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from [`StudioConfig::default_path`] if
    /// that file exists, else return the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// `<config dir>/creditwipe/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("creditwipe").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(WipeError::Config(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport_width, self.viewport_height
            )));
        }
        if self.cache_capacity == 0 {
            return Err(WipeError::Config(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
