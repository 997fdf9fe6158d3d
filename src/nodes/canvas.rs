//! Solid Canvas node.

use clap::ValueEnum;
use image::Rgb;
use ndarray::ArrayD;

use crate::error::{Error, Result};
use crate::image::{ensure_batched, solid_canvas, ColorPreset, ImageTensor};

/// Largest accepted canvas side.
const MAX_SIDE: usize = 16_384;

/// How many canvases to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum BatchMode {
    /// As many as the reference image has, when one is given.
    #[default]
    MatchReference,
    /// Always one.
    Single,
}

/// Configuration for the flat color canvas node.
#[derive(Debug, Clone)]
pub struct SolidCanvas {
    /// Take width and height from the reference image when one is given.
    pub auto_from_image: bool,

    /// Canvas width (1-16384) when not taken from the reference.
    pub width: usize,

    /// Canvas height (1-16384) when not taken from the reference.
    pub height: usize,

    /// Batch size policy.
    pub batch_mode: BatchMode,

    /// Fill color preset.
    pub preset: ColorPreset,

    /// Fill color used only with [`ColorPreset::Custom`].
    pub custom: Rgb<u8>,
}

impl Default for SolidCanvas {
    fn default() -> Self {
        Self {
            auto_from_image: true,
            width: 1024,
            height: 1024,
            batch_mode: BatchMode::default(),
            preset: ColorPreset::default(),
            custom: Rgb([255, 255, 255]),
        }
    }
}

impl SolidCanvas {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(1..=MAX_SIDE).contains(&value) {
                return Err(Error::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("must be between 1 and {MAX_SIDE}"),
                });
            }
        }

        Ok(())
    }

    /// Build the canvas, optionally sized after `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or `reference` is not
    /// an image tensor.
    pub fn make(&self, reference: Option<ArrayD<f32>>) -> Result<ImageTensor> {
        self.validate()?;

        let reference = reference.map(ensure_batched).transpose()?;
        let color = self.preset.resolve(self.custom);

        let (height, width) = match (&reference, self.auto_from_image) {
            (Some(r), true) => (r.shape()[1], r.shape()[2]),
            _ => (self.height, self.width),
        };
        let batch = match (&reference, self.batch_mode) {
            (Some(r), BatchMode::MatchReference) => r.shape()[0],
            _ => 1,
        };

        tracing::info!(
            "Generating {batch} canvas(es) of {width}x{height} filled with {:?}",
            color.0
        );
        Ok(solid_canvas(width, height, batch, color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_explicit_size_and_custom_color() {
        let node = SolidCanvas {
            width: 10,
            height: 5,
            preset: ColorPreset::Custom,
            custom: Rgb([255, 0, 0]),
            ..SolidCanvas::default()
        };
        let canvas = node.make(None).unwrap();

        assert_eq!(canvas.shape(), &[1, 5, 10, 3]);
        assert!(canvas
            .lanes(ndarray::Axis(3))
            .into_iter()
            .all(|px| px.to_vec() == vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_preset_overrides_custom() {
        let node = SolidCanvas {
            width: 2,
            height: 2,
            preset: ColorPreset::PureBlack,
            custom: Rgb([255, 0, 0]),
            ..SolidCanvas::default()
        };
        let canvas = node.make(None).unwrap();

        assert!(canvas.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_size_and_batch_from_reference() {
        let reference = ArrayD::<f32>::zeros(IxDyn(&[3, 7, 9, 3]));
        let canvas = SolidCanvas::default().make(Some(reference)).unwrap();

        assert_eq!(canvas.shape(), &[3, 7, 9, 3]);
        assert!((canvas[[2, 6, 8, 0]] - 247.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_mode_with_reference() {
        let reference = ArrayD::<f32>::zeros(IxDyn(&[3, 7, 9, 3]));
        let node = SolidCanvas {
            batch_mode: BatchMode::Single,
            ..SolidCanvas::default()
        };

        assert_eq!(node.make(Some(reference)).unwrap().shape(), &[1, 7, 9, 3]);
    }

    #[test]
    fn test_manual_size_keeps_reference_batch() {
        let reference = ArrayD::<f32>::zeros(IxDyn(&[3, 7, 9, 3]));
        let node = SolidCanvas {
            auto_from_image: false,
            width: 4,
            height: 2,
            ..SolidCanvas::default()
        };

        assert_eq!(node.make(Some(reference)).unwrap().shape(), &[3, 2, 4, 3]);

        let unbatched = ArrayD::<f32>::zeros(IxDyn(&[7, 9, 3]));
        assert_eq!(node.make(Some(unbatched)).unwrap().shape(), &[1, 2, 4, 3]);
    }

    #[test]
    fn test_bad_reference_and_size() {
        let reference = ArrayD::<f32>::zeros(IxDyn(&[7, 9]));
        assert!(matches!(
            SolidCanvas::default().make(Some(reference)),
            Err(Error::TypeMismatch { .. })
        ));

        let node = SolidCanvas {
            width: 0,
            ..SolidCanvas::default()
        };
        assert!(matches!(node.make(None), Err(Error::InvalidParameter { .. })));
    }
}
