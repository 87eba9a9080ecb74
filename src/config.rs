//! Serializable run configuration.
//!
//! ```
//! use icon_rasterizer::RenderConfig;
//!
//! let config = RenderConfig::new().with_batch_size(4).with_skip_existing(true);
//! let json = config.to_json().unwrap();
//! let restored = RenderConfig::from_json(&json).unwrap();
//! assert_eq!(restored.batch_size, 4);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RasterError;

/// Tasks rendered together on one surface.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Vertical gap in pixels left above every output region.
pub const DEFAULT_GAP: u32 = 8;

/// Settings for one rasterization run.
///
/// # JSON Format
///
/// ```json
/// {
///   "batchSize": 10,
///   "gap": 8,
///   "skipExisting": false,
///   "debugDir": "build/debug",
///   "loadSystemFonts": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub batch_size: usize,

    pub gap: u32,

    /// Drop destinations that already exist instead of overwriting them.
    pub skip_existing: bool,

    /// Where to dump the task list and batch snapshots, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_dir: Option<PathBuf>,

    pub load_system_fonts: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            gap: DEFAULT_GAP,
            skip_existing: false,
            debug_dir: None,
            load_system_fonts: true,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_gap(mut self, gap: u32) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn with_system_fonts(mut self, load: bool) -> Self {
        self.load_system_fonts = load;
        self
    }

    /// Checks that the configuration can drive a run.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.batch_size == 0 {
            return Err(RasterError::Config("batchSize must be at least 1".into()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_deserializes_to_defaults() {
        let config = RenderConfig::from_json("{}").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.batch_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_json_format() {
        let config = RenderConfig::new()
            .with_gap(4)
            .with_debug_dir("debug")
            .with_system_fonts(false);
        let json = config.to_json_pretty().unwrap();

        assert!(json.contains("\"batchSize\""));
        assert!(json.contains("\"skipExisting\""));
        assert!(json.contains("\"debugDir\""));
        assert_eq!(RenderConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = RenderConfig::new().with_batch_size(0).validate().unwrap_err();
        assert!(err.is_batch_fatal());
    }
}
