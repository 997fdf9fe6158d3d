//! Background removal collaborators.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use ndarray::Array4;
use once_cell::sync::Lazy;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};

use super::cache::{SessionCache, SharedSession};
use super::{ModelDir, ModelKind};

/// Whatever a removal backend hands back, before normalization.
#[derive(Debug, Clone)]
pub enum RemovalOutput {
    /// An already decoded image.
    Image(DynamicImage),
    /// An encoded image container (PNG, WEBP, ...).
    Encoded(Vec<u8>),
}

impl RemovalOutput {
    /// Resolve into an RGBA buffer; opaque results get alpha 255.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedRemovalOutput`] when the bytes are not a
    /// known image container, and [`Error::ImageDecode`] when they are but
    /// cannot be decoded.
    pub fn into_rgba(self) -> Result<RgbaImage> {
        match self {
            Self::Image(img) => Ok(img.into_rgba8()),
            Self::Encoded(bytes) => {
                let format =
                    image::guess_format(&bytes).map_err(|_| Error::UnrecognizedRemovalOutput {
                        reason: format!("{} bytes in no known image format", bytes.len()),
                    })?;
                let img = image::load_from_memory_with_format(&bytes, format)
                    .map_err(|source| Error::ImageDecode { source })?;
                Ok(img.into_rgba8())
            }
        }
    }
}

/// Something that cuts the foreground out of an image.
pub trait BackgroundRemover {
    /// Produce a cutout of `image` whose alpha channel marks the foreground.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove(&mut self, image: &RgbImage) -> Result<RemovalOutput>;
}

/// Segmentation model running on ONNX Runtime.
pub struct OnnxRemover {
    kind: ModelKind,
    session: Session,
}

static ONNX_SESSIONS: Lazy<SessionCache<OnnxRemover>> = Lazy::new(SessionCache::new);

impl OnnxRemover {
    /// Load `kind` from a verified model directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load(models: &ModelDir, kind: ModelKind) -> Result<Self> {
        let session = models.load_session(kind)?;
        Ok(Self { kind, session })
    }

    /// Process-wide session for `kind`, loaded on first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the model has to be loaded and loading fails.
    pub fn shared(models: &ModelDir, kind: ModelKind) -> Result<SharedSession<Self>> {
        ONNX_SESSIONS.get_or_try_init(kind, || Self::load(models, kind))
    }

    /// The model this remover runs.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict_mask(&mut self, image: &RgbImage) -> Result<GrayImage> {
        let size = self.kind.input_size();
        let input = preprocess(image, size, self.kind.normalization());
        let input_value = Tensor::from_array(input).map_err(|source| Error::Inference { source })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "mask output".to_string(),
                actual: "no output".to_string(),
            })?;

        let (shape_info, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|source| Error::Inference { source })?;

        // First output plane is (.., H, W); the leading dims are all 1.
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();
        let (h, w) = match dims.as_slice() {
            [.., h, w] if h * w > 0 && data.len() >= h * w => (*h, *w),
            _ => {
                return Err(Error::ShapeMismatch {
                    expected: "mask tensor (.., H, W)".to_string(),
                    actual: format!("{dims:?}"),
                })
            }
        };

        let mask = normalize_plane(&data[..h * w], w, h)?;
        Ok(imageops::resize(
            &mask,
            image.width(),
            image.height(),
            FilterType::Lanczos3,
        ))
    }
}

impl BackgroundRemover for OnnxRemover {
    fn remove(&mut self, image: &RgbImage) -> Result<RemovalOutput> {
        let mask = self.predict_mask(image)?;
        Ok(RemovalOutput::Image(DynamicImage::ImageRgba8(apply_mask(
            image, &mask,
        ))))
    }
}

/// Resize to the model resolution and lay out as normalized NCHW.
fn preprocess(image: &RgbImage, size: u32, (mean, std): ([f32; 3], [f32; 3])) -> Array4<f32> {
    let resized = imageops::resize(image, size, size, FilterType::Lanczos3);
    let side = size as usize;

    Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        #[allow(clippy::cast_possible_truncation)]
        let value = f32::from(resized.get_pixel(x as u32, y as u32)[c]) / 255.0;
        (value - mean[c]) / std[c]
    })
}

/// Min-max normalize a prediction plane into an 8-bit mask.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn normalize_plane(plane: &[f32], width: usize, height: usize) -> Result<GrayImage> {
    let lo = plane.iter().copied().fold(f32::INFINITY, f32::min);
    let hi = plane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = (hi - lo).max(f32::EPSILON);

    let pixels = plane
        .iter()
        .map(|&v| (((v - lo) / range).clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();

    let (w, h) = (
        u32::try_from(width).unwrap_or(u32::MAX),
        u32::try_from(height).unwrap_or(u32::MAX),
    );
    GrayImage::from_raw(w, h, pixels).ok_or_else(|| Error::ShapeMismatch {
        expected: format!("{width}x{height} mask"),
        actual: format!("{} values", plane.len()),
    })
}

/// Attach `mask` as alpha. Fully transparent pixels are zeroed.
fn apply_mask(image: &RgbImage, mask: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let Luma([alpha]) = *mask.get_pixel(x, y);
        if alpha == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            let p = image.get_pixel(x, y);
            Rgba([p[0], p[1], p[2], alpha])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_decoded_output_passes_through() {
        let rgba = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let out = RemovalOutput::Image(DynamicImage::ImageRgba8(rgba.clone()))
            .into_rgba()
            .unwrap();

        assert_eq!(out, rgba);
    }

    #[test]
    fn test_opaque_output_gets_full_alpha() {
        let rgb = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
        let out = RemovalOutput::Image(DynamicImage::ImageRgb8(rgb))
            .into_rgba()
            .unwrap();

        assert!(out.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_encoded_output_is_decoded() {
        let rgba = RgbaImage::from_fn(4, 4, |x, y| Rgba([x as u8, y as u8, 0, (x * 60) as u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(rgba.clone())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let out = RemovalOutput::Encoded(bytes).into_rgba().unwrap();
        assert_eq!(out, rgba);
    }

    #[test]
    fn test_unknown_bytes_are_rejected() {
        let err = RemovalOutput::Encoded(b"definitely not an image".to_vec())
            .into_rgba()
            .unwrap_err();

        assert!(matches!(err, Error::UnrecognizedRemovalOutput { .. }));
    }

    #[test]
    fn test_normalize_plane_stretches_range() {
        let mask = normalize_plane(&[2.0, 3.0, 4.0, 6.0], 2, 2).unwrap();

        assert_eq!(mask.as_raw(), &vec![0, 64, 128, 255]);
    }

    #[test]
    fn test_normalize_flat_plane() {
        let mask = normalize_plane(&[0.3; 6], 3, 2).unwrap();

        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_apply_mask_clears_transparent_pixels() {
        let image = RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]));
        let mask = GrayImage::from_raw(2, 1, vec![0, 200]).unwrap();
        let out = apply_mask(&image, &mask);

        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([10, 20, 30, 200]));
    }

    #[test]
    fn test_preprocess_layout() {
        let image = RgbImage::from_pixel(5, 3, Rgb([255, 0, 255]));
        let tensor = preprocess(&image, 4, ([0.5; 3], [1.0; 3]));

        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
        assert!((tensor[[0, 0, 2, 2]] - 0.5).abs() < 1e-3);
        assert!((tensor[[0, 1, 2, 2]] + 0.5).abs() < 1e-3);
    }
}
