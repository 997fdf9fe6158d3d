//! Batch Load / Batch Save nodes.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use ndarray::ArrayD;

use crate::error::{Error, Result};
use crate::image::{
    concat_images, decode_image, ensure_batched, image_to_tensor, list_images, mask_to_gray,
    output_base_name, parse_filenames, save_rgb, tensor_to_rgb, ImageTensor, MaskTensor,
    OutputFormat, SortOrder, IMAGE_EXTENSIONS,
};

use super::progress_bar;

/// Largest accepted `max_images` / `start_index`.
const MAX_COUNT: usize = 999_999;

/// What to do when images in a folder differ in size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Resample every image to the size of the first one.
    #[default]
    ResizeToFirst,
    /// Fail unless every image has the size of the first one.
    NoResizeRequireSame,
}

/// Configuration for loading a folder as one batch.
#[derive(Debug, Clone)]
pub struct BatchLoad {
    /// Folder to scan; relative paths resolve against the base directory.
    pub folder: PathBuf,

    /// Descend into subfolders.
    pub recursive: bool,

    /// Maximum number of images to load (1-999999).
    pub max_images: usize,

    /// Number of sorted files to skip (0-999999).
    pub start_index: usize,

    /// File ordering.
    pub sort: SortOrder,

    /// Size policy.
    pub resize_mode: ResizeMode,
}

impl Default for BatchLoad {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("input/batch_in"),
            recursive: false,
            max_images: 9999,
            start_index: 0,
            sort: SortOrder::default(),
            resize_mode: ResizeMode::default(),
        }
    }
}

/// A folder loaded as one tensor.
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    /// `(B, H, W, 3)` images.
    pub images: ImageTensor,

    /// Base file names, in batch order.
    pub filenames: Vec<String>,
}

impl LoadedBatch {
    /// File names joined by newlines, as passed between nodes.
    #[must_use]
    pub fn filenames_text(&self) -> String {
        self.filenames.join("\n")
    }
}

impl BatchLoad {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_COUNT).contains(&self.max_images) {
            return Err(Error::InvalidParameter {
                name: "max_images".to_string(),
                reason: format!("must be between 1 and {MAX_COUNT}"),
            });
        }

        if self.start_index > MAX_COUNT {
            return Err(Error::InvalidParameter {
                name: "start_index".to_string(),
                reason: format!("must be between 0 and {MAX_COUNT}"),
            });
        }

        Ok(())
    }

    /// Load the configured folder, resolving relative paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] when the folder is missing or has
    /// no images in range, [`Error::ShapeMismatch`] when sizes differ under
    /// [`ResizeMode::NoResizeRequireSame`], or any decode error.
    pub fn load(&self, base: &Path) -> Result<LoadedBatch> {
        self.validate()?;

        let folder = if self.folder.is_absolute() {
            self.folder.clone()
        } else {
            base.join(&self.folder)
        };

        if !folder.is_dir() {
            return Err(Error::ResourceNotFound {
                what: "folder not found",
                path: folder,
            });
        }

        let mut files = list_images(&folder, self.recursive, &IMAGE_EXTENSIONS)?;
        self.sort.apply(&mut files)?;
        let files: Vec<_> = files
            .into_iter()
            .skip(self.start_index)
            .take(self.max_images)
            .collect();

        if files.is_empty() {
            return Err(Error::ResourceNotFound {
                what: "no images found in",
                path: folder,
            });
        }

        tracing::info!("Loading {} image(s) from {}", files.len(), folder.display());

        let mut tensors = Vec::with_capacity(files.len());
        let mut filenames = Vec::with_capacity(files.len());
        let mut target: Option<(u32, u32)> = None;
        let pb = progress_bar(files.len(), "Loading");

        for path in &files {
            let img = DynamicImage::ImageRgb8(decode_image(path)?.to_rgb8());
            let (width, height) = *target.get_or_insert(img.dimensions());

            let img = if img.dimensions() == (width, height) {
                img
            } else {
                match self.resize_mode {
                    ResizeMode::ResizeToFirst => {
                        tracing::debug!(
                            "Resizing {} from {:?} to {width}x{height}",
                            path.display(),
                            img.dimensions()
                        );
                        img.resize_exact(width, height, FilterType::Lanczos3)
                    }
                    ResizeMode::NoResizeRequireSame => {
                        return Err(Error::ShapeMismatch {
                            expected: format!("{width}x{height} (size of the first image)"),
                            actual: format!(
                                "{}x{} for {}; set resize_mode=resize_to_first to auto-resize",
                                img.width(),
                                img.height(),
                                path.display()
                            ),
                        });
                    }
                }
            };

            tensors.push(image_to_tensor(&img));
            filenames.push(
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(LoadedBatch {
            images: concat_images(&tensors)?,
            filenames,
        })
    }
}

/// Configuration for writing a batch to disk.
#[derive(Debug, Clone)]
pub struct BatchSave {
    /// Folder under the output directory that receives the files.
    pub subfolder: String,

    /// Container format.
    pub format: OutputFormat,

    /// JPEG quality (1-100).
    pub quality: u8,

    /// Prepended to every base name.
    pub prefix: String,
}

impl Default for BatchSave {
    fn default() -> Self {
        Self {
            subfolder: "keying_batch".to_string(),
            format: OutputFormat::default(),
            quality: 95,
            prefix: String::new(),
        }
    }
}

impl BatchSave {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(Error::InvalidParameter {
                name: "quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }

    /// Save every image of `images` under `<output_dir>/<subfolder>`.
    ///
    /// `filenames` is a newline separated list; element `i` is named after
    /// its `i`-th entry, or a zero-padded index when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor cannot be converted or a file cannot be
    /// written.
    pub fn save(
        &self,
        output_dir: &Path,
        images: ArrayD<f32>,
        filenames: &str,
    ) -> Result<Vec<PathBuf>> {
        self.validate()?;

        let images = ensure_batched(images)?;
        let target = self.target_dir(output_dir)?;
        let names = parse_filenames(filenames);
        let count = images.shape()[0];

        tracing::info!("Saving {count} image(s) to {}", target.display());

        let pb = progress_bar(count, "Saving");
        let mut saved = Vec::with_capacity(count);
        for index in 0..count {
            let img = tensor_to_rgb(images.view(), index)?;
            let path = target.join(format!(
                "{}.{}",
                output_base_name(index, &names, &self.prefix),
                self.format.extension()
            ));

            save_rgb(&img, &path, self.format, self.quality)?;
            tracing::debug!("Saved {}", path.display());
            saved.push(path);
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(saved)
    }

    /// Save every mask of `masks` as a grayscale PNG, named like [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn save_masks(
        &self,
        output_dir: &Path,
        masks: &MaskTensor,
        filenames: &str,
    ) -> Result<Vec<PathBuf>> {
        let target = self.target_dir(output_dir)?;
        let names = parse_filenames(filenames);
        let count = masks.shape()[0];

        let mut saved = Vec::with_capacity(count);
        for index in 0..count {
            let gray = mask_to_gray(masks, index)?;
            let base = output_base_name(index, &names, &self.prefix);
            let path = target.join(format!("{base}.png"));

            gray.save_with_format(&path, ImageFormat::Png)
                .map_err(|source| Error::ImageSave {
                    path: path.clone(),
                    source,
                })?;
            saved.push(path);
        }

        Ok(saved)
    }

    fn target_dir(&self, output_dir: &Path) -> Result<PathBuf> {
        let target = output_dir.join(&self.subfolder);
        fs::create_dir_all(&target).map_err(|source| Error::OutputDir {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

/// Paths joined by newlines, as passed between nodes.
#[must_use]
pub fn paths_text(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
