//! Image tensors, pixel buffers and the conversions between them.

pub mod canvas;
pub mod composite;
pub mod convert;
pub mod load;
pub mod save;

pub use canvas::{solid_canvas, ColorPreset};
pub use composite::composite_over;
pub use convert::{
    alpha_to_mask, concat_images, concat_masks, ensure_batched, image_to_tensor, mask_to_gray,
    single_tensor_to_rgb, tensor_to_rgb,
};
pub use load::{decode_image, list_images, SortOrder, IMAGE_EXTENSIONS};
pub use save::{output_base_name, parse_filenames, save_rgb, OutputFormat};

use ndarray::{Array3, Array4};

/// Batched image tensor in BHWC format (batch, height, width, channels).
/// Values are normalized to [0, 1].
pub type ImageTensor = Array4<f32>;

/// Batched mask tensor in BHW format. Values are opacity in [0, 1].
pub type MaskTensor = Array3<f32>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;
