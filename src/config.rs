//! Loading tracker configuration from TOML or JSON files.
//!
//! Every field is optional; missing fields take the `TrackerConfig` defaults.
//!
//! ```toml
//! distance_threshold = 80.0
//! max_frames_to_skip = 15
//! max_trace_length = 30
//! use_kalman_filter = true
//! distance_function = "euclidean"
//!
//! [kalman]
//! dt = 0.04
//! std_acc = 3.0
//! ```

use std::fs;
use std::path::Path;

use crate::{Error, Result, TrackerConfig};

impl TrackerConfig {
    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TrackerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    ///
    /// The format follows the extension: `.json` is read as JSON, `.toml` as
    /// TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => Err(Error::InvalidConfig(format!(
                "unsupported config format {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}
