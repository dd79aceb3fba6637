//! Four-point perspective mapping and warping onto the template canvas.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// Resampling used when warping onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpInterpolation {
    /// Keeps a bilevel input bilevel.
    #[default]
    Nearest,
    Bilinear,
}

impl From<WarpInterpolation> for Interpolation {
    fn from(w: WarpInterpolation) -> Self {
        match w {
            WarpInterpolation::Nearest => Interpolation::Nearest,
            WarpInterpolation::Bilinear => Interpolation::Bilinear,
        }
    }
}

fn to_f32(points: &[[f64; 2]; 4]) -> [(f32, f32); 4] {
    points.map(|[x, y]| (x as f32, y as f32))
}

/// Projection taking each `from` corner onto the matching `to` corner.
///
/// Corners are ordered `[tl, tr, bl, br]` on both sides. Returns `None` when
/// the corners do not determine an invertible mapping.
pub fn corner_projection(from: &[[f64; 2]; 4], to: &[[f64; 2]; 4]) -> Option<Projection> {
    Projection::from_control_points(to_f32(from), to_f32(to))
}

/// Corners of a `width × height` canvas, ordered `[tl, tr, bl, br]`.
pub fn canvas_corners(width: u32, height: u32) -> [[f64; 2]; 4] {
    let (w, h) = (width as f64, height as f64);
    [[0.0, 0.0], [w, 0.0], [0.0, h], [w, h]]
}

/// Warp `image` through `projection` (input pixel → output pixel) onto a
/// `width × height` canvas.
///
/// Output pixels that map outside the input are filled with white (255),
/// the paper background.
pub fn warp_to_canvas(
    image: &GrayImage,
    projection: &Projection,
    width: u32,
    height: u32,
    interpolation: WarpInterpolation,
) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    warp_into(image, projection, interpolation.into(), Luma([255u8]), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn corner_projection_maps_each_corner() {
        let quad = [[12.0, 9.0], [410.0, 20.0], [5.0, 770.0], [420.0, 790.0]];
        let canvas = canvas_corners(400, 760);
        let p = corner_projection(&quad, &canvas).unwrap();
        for (q, c) in quad.iter().zip(&canvas) {
            let (x, y) = p * (q[0] as f32, q[1] as f32);
            assert_abs_diff_eq!(x as f64, c[0], epsilon = 1e-2);
            assert_abs_diff_eq!(y as f64, c[1], epsilon = 1e-2);
        }
    }

    #[test]
    fn collapsed_corners_have_no_projection() {
        let point = [[50.0, 50.0]; 4];
        assert!(corner_projection(&point, &canvas_corners(40, 30)).is_none());
    }

    #[test]
    fn translation_shifts_content_and_fills_white() {
        let img = GrayImage::from_pixel(20, 20, Luma([0]));
        let out = warp_to_canvas(
            &img,
            &Projection::translate(10.0, 0.0),
            40,
            20,
            WarpInterpolation::Nearest,
        );
        assert_eq!(out.get_pixel(15, 10)[0], 0);
        assert_eq!(out.get_pixel(35, 10)[0], 255);
        assert_eq!(out.get_pixel(2, 10)[0], 255);
    }

    #[test]
    fn nearest_keeps_binary_input_binary() {
        let mut img = GrayImage::from_pixel(30, 30, Luma([255]));
        for y in 0..30 {
            img.put_pixel(11, y, Luma([0]));
        }
        let skewed = [[0.5, 0.2], [29.0, 1.0], [1.0, 29.5], [30.0, 28.0]];
        let p = corner_projection(&skewed, &canvas_corners(30, 30)).unwrap();
        let out = warp_to_canvas(&img, &p, 30, 30, WarpInterpolation::Nearest);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(out.pixels().any(|p| p[0] == 0));
    }

    #[test]
    fn interpolation_names_round_trip_through_json() {
        let json = serde_json::to_string(&WarpInterpolation::Bilinear).unwrap();
        assert_eq!(json, "\"bilinear\"");
        let back: WarpInterpolation = serde_json::from_str("\"nearest\"").unwrap();
        assert_eq!(back, WarpInterpolation::Nearest);
    }
}
