//! Local segmentation models and their sessions.

mod cache;
mod loader;
mod remover;

pub use cache::{SessionCache, SharedSession};
pub use loader::{ModelDir, ModelKind};
pub use remover::{BackgroundRemover, OnnxRemover, RemovalOutput};
