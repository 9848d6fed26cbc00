use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::types::Size2D;

/// Read and deserialize a JSON file into `T`.
pub fn load_typed_json<T: DeserializeOwned>(path: &Path) -> Result<T, ChainError> {
    let text = fs::read_to_string(path).map_err(|e| ChainError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ChainError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Video driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Bilinear filtering for the stock chain.
    #[serde(default = "default_true")]
    pub smooth: bool,

    #[serde(default = "default_true")]
    pub keep_aspect: bool,

    /// Display aspect ratio; `None` uses the frame's own ratio.
    #[serde(default)]
    pub aspect_ratio: Option<f32>,

    /// Snap the viewport to integer multiples of the frame size.
    #[serde(default)]
    pub integer_scale: bool,

    /// Quarter turns counter-clockwise.
    #[serde(default)]
    pub rotation: u32,

    #[serde(default)]
    pub shader_preset: Option<PathBuf>,

    /// Frames the GPU may have in flight.
    #[serde(default = "default_sync_indices")]
    pub sync_indices: usize,

    /// Largest core frame the chain is sized for at build time.
    #[serde(default = "default_max_input_size")]
    pub max_input_size: Size2D,
}

fn default_true() -> bool {
    true
}
fn default_sync_indices() -> usize {
    2
}
fn default_max_input_size() -> Size2D {
    Size2D::new(1024, 1024)
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            smooth: true,
            keep_aspect: true,
            aspect_ratio: None,
            integer_scale: false,
            rotation: 0,
            shader_preset: None,
            sync_indices: default_sync_indices(),
            max_input_size: default_max_input_size(),
        }
    }
}

impl VideoConfig {
    pub fn from_json_path(path: &Path) -> Result<Self, ChainError> {
        let cfg: VideoConfig = load_typed_json(path)?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    fn validate(&self, path: &Path) -> Result<(), ChainError> {
        if self.sync_indices == 0 {
            return Err(ChainError::Config {
                path: path.to_path_buf(),
                msg: "sync_indices must be at least 1".into(),
            });
        }
        if let Some(ratio) = self.aspect_ratio {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(ChainError::Config {
                    path: path.to_path_buf(),
                    msg: format!("aspect_ratio must be positive, got {ratio}"),
                });
            }
        }
        Ok(())
    }
}
