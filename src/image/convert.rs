//! Conversions between batched `f32` tensors and 8-bit pixel buffers.
//!
//! Tensors follow the host layout: images are `(batch, height, width, channels)`
//! and masks are `(batch, height, width)`, both normalized to [0, 1]. Only the
//! batch axis is ever added or removed; a height or width of 1 is a valid image.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use ndarray::{concatenate, Array3, Array4, ArrayD, ArrayView3, ArrayView4, Axis, Ix4};

use crate::error::{Error, Result};

use super::{ImageTensor, MaskTensor, RGB_CHANNELS};

/// Promote an image tensor of rank 3 `(H, W, C)` to a batch of one.
///
/// Rank 4 tensors pass through untouched.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] for any other rank.
pub fn ensure_batched(tensor: ArrayD<f32>) -> Result<ImageTensor> {
    match tensor.ndim() {
        3 => {
            let shape = tensor.shape().to_vec();
            tensor
                .insert_axis(Axis(0))
                .into_dimensionality::<Ix4>()
                .map_err(|_| Error::TypeMismatch {
                    expected: "IMAGE tensor with 3 or 4 dims".to_string(),
                    actual: format!("shape={shape:?}"),
                })
        }
        4 => {
            let shape = tensor.shape().to_vec();
            tensor
                .into_dimensionality::<Ix4>()
                .map_err(|_| Error::TypeMismatch {
                    expected: "IMAGE tensor with 3 or 4 dims".to_string(),
                    actual: format!("shape={shape:?}"),
                })
        }
        _ => Err(Error::TypeMismatch {
            expected: "IMAGE tensor with 3 or 4 dims".to_string(),
            actual: format!("shape={:?}", tensor.shape()),
        }),
    }
}

/// Convert batch element `index` of an image tensor to an opaque RGB buffer.
///
/// Values are clamped to [0, 1] and scaled with rounding. One channel is
/// broadcast to three, a fourth (alpha) channel is dropped.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] if `index` is outside the batch and
/// [`Error::UnsupportedChannelCount`] for channel counts other than 1, 3 or 4.
pub fn tensor_to_rgb(tensor: ArrayView4<'_, f32>, index: usize) -> Result<RgbImage> {
    let batch = tensor.shape()[0];
    if index >= batch {
        return Err(Error::TypeMismatch {
            expected: format!("batch index < {batch}"),
            actual: format!("index {index}"),
        });
    }

    frame_to_rgb(tensor.index_axis(Axis(0), index))
}

/// Convert a tensor that must hold exactly one image.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] when the batch size is not 1.
pub fn single_tensor_to_rgb(tensor: ArrayView4<'_, f32>) -> Result<RgbImage> {
    let batch = tensor.shape()[0];
    if batch != 1 {
        return Err(Error::TypeMismatch {
            expected: "batch size 1".to_string(),
            actual: format!("batch size {batch}"),
        });
    }

    frame_to_rgb(tensor.index_axis(Axis(0), 0))
}

#[allow(clippy::cast_possible_truncation)]
fn frame_to_rgb(frame: ArrayView3<'_, f32>) -> Result<RgbImage> {
    let (height, width, channels) = frame.dim();
    if !matches!(channels, 1 | 3 | 4) {
        return Err(Error::UnsupportedChannelCount { channels });
    }

    let (w, h) = buffer_dims(width, height)?;
    let mut img = RgbImage::new(w, h);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let (row, col) = (y as usize, x as usize);
        *pixel = if channels == 1 {
            let v = to_u8(frame[[row, col, 0]]);
            Rgb([v, v, v])
        } else {
            Rgb([
                to_u8(frame[[row, col, 0]]),
                to_u8(frame[[row, col, 1]]),
                to_u8(frame[[row, col, 2]]),
            ])
        };
    }

    Ok(img)
}

/// Convert a decoded image to a batch-of-one RGB tensor `(1, H, W, 3)`.
///
/// Alpha is dropped here; use [`alpha_to_mask`] to keep it.
#[must_use]
pub fn image_to_tensor(img: &DynamicImage) -> ImageTensor {
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);

    let mut tensor = Array4::<f32>::zeros((1, height, width, RGB_CHANNELS));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (row, col) = (y as usize, x as usize);
        for c in 0..RGB_CHANNELS {
            tensor[[0, row, col, c]] = f32::from(pixel[c]) / 255.0;
        }
    }

    tensor
}

/// Extract the alpha channel of a decoded image as a mask `(1, H, W)`.
///
/// Images without alpha are treated as fully opaque.
#[must_use]
pub fn alpha_to_mask(img: &DynamicImage) -> MaskTensor {
    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);

    let mut mask = Array3::<f32>::zeros((1, height, width));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        mask[[0, y as usize, x as usize]] = f32::from(pixel[3]) / 255.0;
    }

    mask
}

/// Convert batch element `index` of a mask tensor to an 8-bit grayscale buffer.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] if `index` is outside the batch.
pub fn mask_to_gray(mask: &MaskTensor, index: usize) -> Result<GrayImage> {
    let (batch, height, width) = mask.dim();
    if index >= batch {
        return Err(Error::TypeMismatch {
            expected: format!("batch index < {batch}"),
            actual: format!("index {index}"),
        });
    }

    let (w, h) = buffer_dims(width, height)?;
    let plane = mask.index_axis(Axis(0), index);
    Ok(GrayImage::from_fn(w, h, |x, y| {
        Luma([to_u8(plane[[y as usize, x as usize]])])
    }))
}

/// Stack batch-of-one image tensors along the batch axis.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] when the parts disagree in size, and
/// [`Error::TypeMismatch`] when there are no parts at all.
pub fn concat_images(parts: &[ImageTensor]) -> Result<ImageTensor> {
    let views: Vec<_> = parts.iter().map(|part| part.view()).collect();
    stack_parts(&views)
}

/// Stack batch-of-one mask tensors along the batch axis.
///
/// # Errors
///
/// Same as [`concat_images`].
pub fn concat_masks(parts: &[MaskTensor]) -> Result<MaskTensor> {
    let views: Vec<_> = parts.iter().map(|part| part.view()).collect();
    stack_parts(&views)
}

fn stack_parts<D: ndarray::RemoveAxis>(
    views: &[ndarray::ArrayView<'_, f32, D>],
) -> Result<ndarray::Array<f32, D>> {
    let Some(first) = views.first() else {
        return Err(Error::TypeMismatch {
            expected: "at least one image".to_string(),
            actual: "empty batch".to_string(),
        });
    };

    if let Some(other) = views.iter().find(|v| v.shape()[1..] != first.shape()[1..]) {
        return Err(Error::ShapeMismatch {
            expected: format!("{:?}", &first.shape()[1..]),
            actual: format!("{:?}", &other.shape()[1..]),
        });
    }

    concatenate(Axis(0), views).map_err(|err| Error::ShapeMismatch {
        expected: format!("{:?}", first.shape()),
        actual: err.to_string(),
    })
}

fn buffer_dims(width: usize, height: usize) -> Result<(u32, u32)> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(Error::TypeMismatch {
            expected: "image dimensions that fit in u32".to_string(),
            actual: format!("{width}x{height}"),
        }),
    }
}

/// Scale a normalized value to [0, 255] with clamping and rounding.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(value: f32) -> u8 {
    // NaN clamps to NaN and casts to 0
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
