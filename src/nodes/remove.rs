//! Remove Background node.

use std::path::Path;
use std::sync::PoisonError;

use clap::ValueEnum;
use image::{DynamicImage, Rgb};
use ndarray::ArrayD;

use crate::error::Result;
use crate::image::{
    alpha_to_mask, composite_over, concat_images, concat_masks, ensure_batched, image_to_tensor,
    tensor_to_rgb, ImageTensor, MaskTensor,
};
use crate::model::{BackgroundRemover, ModelDir, ModelKind, OnnxRemover};

use super::progress_bar;

/// What the image output of [`RemoveBackground`] contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    /// Color channels of the cutout, alpha dropped.
    #[default]
    Cutout,
    /// Cutout composited over the background color.
    #[value(alias = "white_bg")]
    Composite,
}

/// Configuration for the background removal node.
#[derive(Debug, Clone)]
pub struct RemoveBackground {
    /// Segmentation model to run.
    pub model: ModelKind,

    /// Image output mode.
    pub output_mode: OutputMode,

    /// Background used by [`OutputMode::Composite`].
    pub background: Rgb<u8>,
}

impl Default for RemoveBackground {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            output_mode: OutputMode::default(),
            background: Rgb([255, 255, 255]),
        }
    }
}

impl RemoveBackground {
    /// Cut out every image of the batch with `remover`.
    ///
    /// Returns the `(B, H, W, 3)` image batch and the `(B, H, W)` alpha masks.
    /// The first failing image aborts the whole batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not an image tensor, if any image
    /// cannot be converted, or if the remover fails.
    pub fn run<R: BackgroundRemover + ?Sized>(
        &self,
        remover: &mut R,
        image: ArrayD<f32>,
    ) -> Result<(ImageTensor, MaskTensor)> {
        let batch = ensure_batched(image)?;
        let count = batch.shape()[0];

        tracing::info!(
            "Removing background from {count} image(s) with {} ({:?})",
            self.model,
            self.output_mode
        );

        let mut images = Vec::with_capacity(count);
        let mut masks = Vec::with_capacity(count);
        let pb = progress_bar(count, "Removing background");

        for index in 0..count {
            let input = tensor_to_rgb(batch.view(), index)?;
            let cutout = DynamicImage::ImageRgba8(remover.remove(&input)?.into_rgba()?);
            tracing::debug!("Image {index}: cutout {}x{}", cutout.width(), cutout.height());
            masks.push(alpha_to_mask(&cutout));

            let output = match self.output_mode {
                OutputMode::Cutout => cutout,
                OutputMode::Composite => DynamicImage::ImageRgb8(composite_over(
                    &cutout.into_rgba8(),
                    self.background,
                )),
            };
            images.push(image_to_tensor(&output));

            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok((concat_images(&images)?, concat_masks(&masks)?))
    }

    /// Run with the process-wide ONNX session for [`Self::model`], loaded from
    /// `<root>/models/u2net`.
    ///
    /// # Errors
    ///
    /// Fails fast with [`crate::Error::MissingLocalAsset`] when model files
    /// are absent, otherwise as [`Self::run`].
    pub fn run_local<P: AsRef<Path>>(
        &self,
        root: P,
        image: ArrayD<f32>,
    ) -> Result<(ImageTensor, MaskTensor)> {
        let models = ModelDir::from_root(root)?;
        let session = OnnxRemover::shared(&models, self.model)?;
        let mut remover = session.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(
            "Removing backgrounds with {} from {}",
            remover.kind(),
            models.path().display()
        );

        self.run(&mut *remover, image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::RemovalOutput;
    use image::{ImageFormat, Rgba, RgbImage, RgbaImage};
    use ndarray::{Array4, IxDyn};
    use std::io::Cursor;

    /// Marks the left half as foreground with a fixed alpha.
    struct HalfRemover {
        alpha: u8,
        encode: bool,
        calls: usize,
    }

    impl BackgroundRemover for HalfRemover {
        fn remove(&mut self, image: &RgbImage) -> Result<RemovalOutput> {
            self.calls += 1;
            let half = image.width() / 2;
            let rgba = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
                let p = image.get_pixel(x, y);
                let a = if x < half { self.alpha } else { 0 };
                Rgba([p[0], p[1], p[2], a])
            });

            if self.encode {
                let mut bytes = Vec::new();
                DynamicImage::ImageRgba8(rgba)
                    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                    .map_err(|source| Error::ImageDecode { source })?;
                Ok(RemovalOutput::Encoded(bytes))
            } else {
                Ok(RemovalOutput::Image(DynamicImage::ImageRgba8(rgba)))
            }
        }
    }

    struct GarbageRemover;

    impl BackgroundRemover for GarbageRemover {
        fn remove(&mut self, _image: &RgbImage) -> Result<RemovalOutput> {
            Ok(RemovalOutput::Encoded(vec![0, 1, 2, 3]))
        }
    }

    fn red_batch(batch: usize) -> ArrayD<f32> {
        Array4::from_shape_fn((batch, 2, 4, 3), |(_, _, _, c)| if c == 0 { 1.0 } else { 0.0 })
            .into_dyn()
    }

    #[test]
    fn test_cutout_and_mask_shapes() {
        let mut remover = HalfRemover { alpha: 255, encode: false, calls: 0 };
        let (images, masks) = RemoveBackground::default()
            .run(&mut remover, red_batch(3))
            .unwrap();

        assert_eq!(remover.calls, 3);
        assert_eq!(images.shape(), &[3, 2, 4, 3]);
        assert_eq!(masks.shape(), &[3, 2, 4]);
        assert_eq!(masks[[2, 1, 0]], 1.0);
        assert_eq!(masks[[2, 1, 3]], 0.0);
        // cutout mode keeps the color channels as returned
        assert_eq!(images[[0, 0, 3, 0]], 1.0);
    }

    #[test]
    fn test_composite_uses_background() {
        let node = RemoveBackground {
            output_mode: OutputMode::Composite,
            background: Rgb([0, 0, 255]),
            ..RemoveBackground::default()
        };
        let mut remover = HalfRemover { alpha: 255, encode: true, calls: 0 };
        let (images, _) = node.run(&mut remover, red_batch(1)).unwrap();

        // opaque left half keeps the foreground, transparent right half is background
        assert_eq!(images[[0, 0, 0, 0]], 1.0);
        assert_eq!(images[[0, 0, 0, 2]], 0.0);
        assert_eq!(images[[0, 0, 3, 0]], 0.0);
        assert_eq!(images[[0, 0, 3, 2]], 1.0);
    }

    #[test]
    fn test_rank_three_input_is_promoted() {
        let image = ArrayD::<f32>::zeros(IxDyn(&[1, 6, 3]));
        let mut remover = HalfRemover { alpha: 128, encode: false, calls: 0 };
        let (images, masks) = RemoveBackground::default().run(&mut remover, image).unwrap();

        assert_eq!(images.shape(), &[1, 1, 6, 3]);
        assert!((masks[[0, 0, 0]] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_unrecognized_output_aborts_batch() {
        let err = RemoveBackground::default()
            .run(&mut GarbageRemover, red_batch(2))
            .unwrap_err();

        assert!(matches!(err, Error::UnrecognizedRemovalOutput { .. }));
    }

    #[test]
    fn test_run_local_requires_model_files() {
        let root = tempfile::tempdir().unwrap();
        let err = RemoveBackground::default()
            .run_local(root.path(), red_batch(1))
            .unwrap_err();

        assert!(matches!(err, Error::MissingLocalAsset { .. }));
    }
}
