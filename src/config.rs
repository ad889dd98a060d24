//! Frozen service configuration.
//!
//! The preprocessing values and the label order are a contract with the
//! trained network; they are not meant to be tuned at deploy time.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::error::StartupError;

pub const MODEL_DIR: &str = "model";
pub const MODEL_FILE: &str = "best_transfer.onnx";

pub const INPUT_SIZE: u32 = 224;
pub const DEFAULT_THRESHOLD: f32 = 0.6;
pub const UNKNOWN_LABEL: &str = "unknown";

/// Class index order the network was trained with.
pub const LABELS: [&str; 3] = ["paper", "rock", "scissors"];

/// Maximum accepted upload (10MB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Side length of the square network input.
    pub input_size: u32,
    pub labels: Vec<String>,
    pub unknown_label: String,
    /// Minimum top-class probability accepted as a real label.
    pub threshold: f32,
    pub max_upload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_size: INPUT_SIZE,
            labels: LABELS.iter().map(|l| l.to_string()).collect(),
            unknown_label: UNKNOWN_LABEL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl PipelineConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if self.labels.is_empty() {
            return Err(StartupError::InvalidConfig(
                "label list must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(StartupError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.input_size == 0 {
            return Err(StartupError::InvalidConfig(
                "input size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub model_path: PathBuf,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8000)),
            model_path: default_model_path(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Resolved at runtime from the running executable: a binary installed as
/// `<root>/bin/gesture-backend` loads `<root>/model/best_transfer.onnx`.
///
/// Falls back to `model/best_transfer.onnx` under the working directory when
/// the executable path is unavailable.
pub fn default_model_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(model_path_from))
        .unwrap_or_else(|| Path::new(MODEL_DIR).join(MODEL_FILE))
}

/// `model/best_transfer.onnx` next to the parent of `code_dir`.
pub fn model_path_from(code_dir: &Path) -> PathBuf {
    code_dir
        .parent()
        .unwrap_or(code_dir)
        .join(MODEL_DIR)
        .join(MODEL_FILE)
}
