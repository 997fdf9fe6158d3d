//! Custom error types for keying-nodes.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the keying-nodes library.
#[derive(Error, Debug)]
pub enum Error {
    /// An input value does not have the expected shape, rank or type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A tensor carries a channel count the codec cannot convert.
    #[error("unsupported channel count: C={channels} (expected 1, 3 or 4)")]
    UnsupportedChannelCount { channels: usize },

    /// Required local model files are absent. Never triggers a download.
    #[error(
        "missing local model files, automatic download is disabled.\nplace the following files in {dir}:\n{list}",
        list = bullet_list(.missing)
    )]
    MissingLocalAsset { dir: PathBuf, missing: Vec<String> },

    /// A referenced folder does not exist or holds no matching files.
    #[error("{what}: {path}")]
    ResourceNotFound { what: &'static str, path: PathBuf },

    /// Shape mismatch between images or tensors.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// The background-removal collaborator returned something that is not an image.
    #[error("unrecognized background removal output: {reason}")]
    UnrecognizedRemovalOutput { reason: String },

    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to decode an in-memory image.
    #[error("failed to decode image bytes: {source}")]
    ImageDecode {
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Failed to create an output directory.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for keying-nodes operations.
pub type Result<T> = std::result::Result<T, Error>;

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
