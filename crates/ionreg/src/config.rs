//! Top-level configuration loaded from JSON.
//!
//! Every section has defaults, so a config file only needs the fields it
//! changes:
//!
//! ```json
//! { "batch": { "prefix": "aligned_", "warp": { "interpolation": "nearest" } } }
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::BatchConfig;
use crate::canvas::MarkerStyle;
use crate::extract::ExtractConfig;
use crate::landmarks::DEFAULT_LANDMARK_FILE;
use crate::layout::LayoutConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read and deserialize a JSON file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Correspondence-collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub landmark_file: PathBuf,
    pub layout: LayoutConfig,
    pub marker: MarkerStyle,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            landmark_file: PathBuf::from(DEFAULT_LANDMARK_FILE),
            layout: LayoutConfig::default(),
            marker: MarkerStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IonregConfig {
    pub hook: HookConfig,
    pub extract: ExtractConfig,
    pub batch: BatchConfig,
}

impl IonregConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg: Self = read_json(path)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }
}
