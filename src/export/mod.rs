use std::path::PathBuf;

use thiserror::Error;

pub mod saved_model;

pub use saved_model::{export, read_manifest, ExportManifest, FORMAT_NAME, FORMAT_VERSION, SERVE_TAG};

/// Errors raised while writing or reading a serving export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to record weights: {0}")]
    Recorder(String),

    #[error("{path} holds something other than a compatible export: {reason}")]
    Incompatible { path: PathBuf, reason: String },

    #[error("no export manifest in {0}")]
    MissingManifest(PathBuf),

    #[error("export does not expose tensor '{0}'")]
    MissingTensor(String),
}
