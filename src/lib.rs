//! # keying-nodes
//!
//! Image-processing nodes for node-based pipelines: background removal with
//! local u2net-family ONNX models, batch folder loading and saving, and solid
//! color canvases.
//!
//! Images travel between nodes as batched `f32` tensors in
//! `(batch, height, width, channels)` layout with values in [0, 1]; masks as
//! `(batch, height, width)`. The [`image`] module converts between that layout
//! and 8-bit pixel buffers.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use keying_nodes::{BatchLoad, BatchSave, RemoveBackground};
//!
//! # fn main() -> keying_nodes::Result<()> {
//! let batch = BatchLoad::default().load(Path::new("."))?;
//! let names = batch.filenames_text();
//!
//! let (images, _masks) = RemoveBackground::default().run_local(".", batch.images.into_dyn())?;
//!
//! BatchSave::default().save(Path::new("output"), images.into_dyn(), &names)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod nodes;

pub use error::{Error, Result};
pub use nodes::{
    BatchLoad, BatchMode, BatchSave, LoadedBatch, OutputMode, RemoveBackground, ResizeMode,
    SolidCanvas,
};
