//! Solid colors and flat canvas generation.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use image::Rgb;
use ndarray::Array4;

use crate::error::Error;

use super::{ImageTensor, RGB_CHANNELS};

/// Common e-commerce and studio background colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorPreset {
    /// Explicit r/g/b values.
    Custom,
    /// #FFFFFF
    PureWhite,
    /// #F7F7F7, the soft studio backdrop.
    #[default]
    StudioGray,
    /// #FAFAF5
    WarmWhite,
    /// #EEEEEE
    LightGray,
    /// #CCCCCC
    MidGray,
    /// #333333
    DarkGray,
    /// #000000
    PureBlack,
    /// #1677FF
    BrandBlue,
}

impl ColorPreset {
    /// Every preset, `Custom` first.
    pub const ALL: [Self; 9] = [
        Self::Custom,
        Self::PureWhite,
        Self::StudioGray,
        Self::WarmWhite,
        Self::LightGray,
        Self::MidGray,
        Self::DarkGray,
        Self::PureBlack,
        Self::BrandBlue,
    ];

    /// Human-readable label, as shown in a node's dropdown.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Custom => "(Custom RGB)",
            Self::PureWhite => "Pure White #FFFFFF",
            Self::StudioGray => "Studio Gray #F7F7F7",
            Self::WarmWhite => "Warm White #FAFAF5",
            Self::LightGray => "Light Gray #EEEEEE",
            Self::MidGray => "Mid Gray #CCCCCC",
            Self::DarkGray => "Dark Gray #333333",
            Self::PureBlack => "Pure Black #000000",
            Self::BrandBlue => "Brand Blue #1677FF",
        }
    }

    /// The preset color, or `None` for [`ColorPreset::Custom`].
    #[must_use]
    pub const fn rgb(&self) -> Option<Rgb<u8>> {
        let rgb = match self {
            Self::Custom => return None,
            Self::PureWhite => [255, 255, 255],
            Self::StudioGray => [247, 247, 247],
            Self::WarmWhite => [250, 250, 245],
            Self::LightGray => [238, 238, 238],
            Self::MidGray => [204, 204, 204],
            Self::DarkGray => [51, 51, 51],
            Self::PureBlack => [0, 0, 0],
            Self::BrandBlue => [22, 119, 255],
        };
        Some(Rgb(rgb))
    }

    /// Resolve the fill color: the preset wins unless it is `Custom`.
    #[must_use]
    pub fn resolve(&self, custom: Rgb<u8>) -> Rgb<u8> {
        self.rgb().unwrap_or(custom)
    }
}

impl fmt::Display for ColorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ColorPreset {
    type Err = Error;

    /// Accepts either the dropdown label or the kebab-case name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| {
                preset.label() == s
                    || preset
                        .to_possible_value()
                        .is_some_and(|value| value.matches(s, true))
            })
            .ok_or_else(|| Error::InvalidParameter {
                name: "preset".to_string(),
                reason: format!("unknown color preset {s:?}"),
            })
    }
}

/// Generate a `(batch, height, width, 3)` tensor filled with `color`.
#[must_use]
pub fn solid_canvas(width: usize, height: usize, batch: usize, color: Rgb<u8>) -> ImageTensor {
    let values = color.0.map(|c| f32::from(c) / 255.0);
    Array4::from_shape_fn((batch, height, width, RGB_CHANNELS), |(_, _, _, c)| values[c])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_canvas() {
        let canvas = solid_canvas(10, 5, 1, Rgb([255, 0, 0]));

        assert_eq!(canvas.shape(), &[1, 5, 10, 3]);
        for pixel in canvas.lanes(ndarray::Axis(3)) {
            assert_eq!(pixel.to_vec(), vec![1.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_canvas_batch() {
        let canvas = solid_canvas(2, 2, 4, Rgb([0, 0, 255]));

        assert_eq!(canvas.shape(), &[4, 2, 2, 3]);
        assert_eq!(canvas[[3, 1, 1, 2]], 1.0);
    }

    #[test]
    fn test_custom_only_when_selected() {
        let custom = Rgb([1, 2, 3]);

        assert_eq!(ColorPreset::Custom.resolve(custom), custom);
        assert_eq!(ColorPreset::StudioGray.resolve(custom), Rgb([247, 247, 247]));
        assert_eq!(ColorPreset::default(), ColorPreset::StudioGray);
    }

    #[test]
    fn test_parse_preset() {
        assert_eq!(
            "Brand Blue #1677FF".parse::<ColorPreset>().unwrap(),
            ColorPreset::BrandBlue
        );
        assert_eq!(
            "warm-white".parse::<ColorPreset>().unwrap(),
            ColorPreset::WarmWhite
        );
        assert!("Hot Pink".parse::<ColorPreset>().is_err());
    }
}
