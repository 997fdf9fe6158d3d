//! Host-facing nodes built on the codec and the model layer.

mod batch;
mod canvas;
mod remove;

pub use batch::{paths_text, BatchLoad, BatchSave, LoadedBatch, ResizeMode};
pub use canvas::{BatchMode, SolidCanvas};
pub use remove::{OutputMode, RemoveBackground};

use indicatif::{ProgressBar, ProgressStyle};

/// Per-image progress for a batch of `len` items.
fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb
}
