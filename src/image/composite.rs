//! Alpha-over compositing onto a flat background.

use image::{Rgb, RgbImage, RgbaImage};

/// Composite an RGBA foreground over an opaque solid color.
///
/// Each channel is `fg * a + bg * (1 - a)` with `a = alpha / 255`, evaluated
/// in integers and rounded to nearest.
#[must_use]
pub fn composite_over(foreground: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(foreground.width(), foreground.height(), |x, y| {
        let fg = foreground.get_pixel(x, y);
        let alpha = fg[3];
        Rgb([
            blend(fg[0], background[0], alpha),
            blend(fg[1], background[1], alpha),
            blend(fg[2], background[2], alpha),
        ])
    })
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let sum = u32::from(fg) * a + u32::from(bg) * (255 - a);
    // sum <= 255 * 255, so the quotient fits in u8
    ((sum + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_transparent_yields_background() {
        let fg = RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8 * 60, y as u8 * 80, 200, 0]));
        let out = composite_over(&fg, Rgb([247, 247, 247]));

        assert_eq!(out.dimensions(), (4, 3));
        assert!(out.pixels().all(|p| *p == Rgb([247, 247, 247])));
    }

    #[test]
    fn test_opaque_yields_foreground() {
        let fg = RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8 * 60, y as u8 * 80, 200, 255]));
        let out = composite_over(&fg, Rgb([22, 119, 255]));

        for (x, y, pixel) in out.enumerate_pixels() {
            let src = fg.get_pixel(x, y);
            assert_eq!(*pixel, Rgb([src[0], src[1], src[2]]));
        }
    }

    #[test]
    fn test_partial_alpha_blends() {
        let fg = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 100, 51]));
        let out = composite_over(&fg, Rgb([0, 255, 100]));

        // 255 * 0.2 = 51, 255 * 0.8 = 204, 100 stays 100
        assert_eq!(out.get_pixel(0, 0), &Rgb([51, 204, 100]));
    }
}
