//! Grayscale conversion and local-mean binarization.
//!
//! Every later stage works on bilevel images: ink is 0, paper is 255.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// Ink value in a bilevel image.
pub const INK: u8 = 0;
/// Paper value in a bilevel image.
pub const PAPER: u8 = 255;

/// Local-mean threshold parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BinarizeConfig {
    /// Half-size of the averaging block; the block is `(2r+1)²` pixels.
    pub block_radius: u32,
    /// A pixel is ink when darker than the block mean minus this offset.
    pub offset: f32,
    /// Pixels darker than this are ink regardless of their surroundings.
    ///
    /// Keeps the interior of large solid marks from being thresholded away.
    pub dark_floor: u8,
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self {
            block_radius: 15,
            offset: 10.0,
            dark_floor: 64,
        }
    }
}

/// Convert any decoded image to 8-bit luma.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Binarize against the local block mean.
///
/// The block is clipped at the image border and its mean taken over the
/// pixels that remain.
pub fn adaptive_binarize(gray: &GrayImage, config: &BinarizeConfig) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let integral = integral_image::<_, u64>(gray);
    let r = config.block_radius;

    for y in 0..h {
        let top = y.saturating_sub(r);
        let bottom = (y + r).min(h - 1);
        for x in 0..w {
            let left = x.saturating_sub(r);
            let right = (x + r).min(w - 1);
            let count = ((right - left + 1) * (bottom - top + 1)) as f32;
            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0] as f32;
            let mean = sum / count;

            let p = gray.get_pixel(x, y)[0];
            let ink = (p as f32) < mean - config.offset || p < config.dark_floor;
            out.put_pixel(x, y, Luma([if ink { INK } else { PAPER }]));
        }
    }
    out
}

/// Foreground mask for contour tracing: ink → 255, paper → 0.
pub fn ink_mask(binary: &GrayImage) -> GrayImage {
    let mut mask = binary.clone();
    for p in mask.pixels_mut() {
        p[0] = if p[0] == INK { 255 } else { 0 };
    }
    mask
}

/// True when every pixel is either [`INK`] or [`PAPER`].
pub fn is_bilevel(image: &GrayImage) -> bool {
    image.pixels().all(|p| p[0] == INK || p[0] == PAPER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_square(bg: u8, fg: u8) -> GrayImage {
        let mut img = GrayImage::from_pixel(80, 80, Luma([bg]));
        for y in 30..50 {
            for x in 30..50 {
                img.put_pixel(x, y, Luma([fg]));
            }
        }
        img
    }

    #[test]
    fn output_is_bilevel() {
        let img = page_with_square(200, 120);
        let bin = adaptive_binarize(&img, &BinarizeConfig::default());
        assert!(is_bilevel(&bin));
        assert_eq!(bin.dimensions(), img.dimensions());
    }

    #[test]
    fn dark_square_on_light_paper_becomes_ink() {
        let img = page_with_square(220, 30);
        let bin = adaptive_binarize(&img, &BinarizeConfig::default());
        assert_eq!(bin.get_pixel(40, 40)[0], INK);
        assert_eq!(bin.get_pixel(31, 31)[0], INK);
        assert_eq!(bin.get_pixel(5, 5)[0], PAPER);
    }

    #[test]
    fn uniform_light_image_is_all_paper() {
        let img = GrayImage::from_pixel(32, 32, Luma([180]));
        let bin = adaptive_binarize(&img, &BinarizeConfig::default());
        assert!(bin.pixels().all(|p| p[0] == PAPER));
    }

    #[test]
    fn dark_floor_keeps_solid_interior() {
        // Block radius smaller than the square: the center sees only ink.
        let img = page_with_square(220, 10);
        let config = BinarizeConfig {
            block_radius: 3,
            ..BinarizeConfig::default()
        };
        let bin = adaptive_binarize(&img, &config);
        assert_eq!(bin.get_pixel(40, 40)[0], INK);

        let no_floor = BinarizeConfig {
            dark_floor: 0,
            ..config
        };
        let hollow = adaptive_binarize(&img, &no_floor);
        assert_eq!(hollow.get_pixel(40, 40)[0], PAPER);
    }

    #[test]
    fn ink_mask_inverts_polarity() {
        let mut bin = GrayImage::from_pixel(3, 1, Luma([PAPER]));
        bin.put_pixel(1, 0, Luma([INK]));
        let mask = ink_mask(&bin);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn bilevel_check_rejects_gray() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([PAPER]));
        assert!(is_bilevel(&img));
        img.put_pixel(2, 2, Luma([127]));
        assert!(!is_bilevel(&img));
    }

    #[test]
    fn to_gray_converts_rgb() {
        let rgb = image::RgbImage::from_pixel(2, 2, image::Rgb([255, 255, 255]));
        let gray = to_gray(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
    }
}
