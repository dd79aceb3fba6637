//! Paper localization and perspective rectification.
//!
//! The photo is binarized, the paper outline is found as a large convex
//! quadrilateral among the ink contours, and the binary image is warped onto
//! a canvas the size of the template.

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::geometric_transformations::Projection;

use crate::homography::{canvas_corners, corner_projection, warp_to_canvas, WarpInterpolation};
use crate::polygon::{approximate_closed, bounding_box, is_convex, polygon_area};
use crate::preprocess::{adaptive_binarize, ink_mask, BinarizeConfig};
use crate::template::SheetTemplate;

/// Failure to find or rectify the paper.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalizationError {
    /// No contour qualified as the paper outline.
    NoSheetFound { contours: usize },
    /// The chosen outline could not be mapped onto the canvas.
    DegenerateQuad { corners: [[f64; 2]; 4] },
}

impl std::fmt::Display for LocalizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSheetFound { contours } => write!(
                f,
                "no paper outline found among {} contours",
                contours
            ),
            Self::DegenerateQuad { corners } => {
                write!(f, "paper outline {:?} has no perspective mapping", corners)
            }
        }
    }
}

impl std::error::Error for LocalizationError {}

/// Paper-outline search parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocalizeConfig {
    /// Polygon simplification tolerance as a fraction of the template diagonal.
    pub polygon_epsilon_frac: f64,
    /// Smallest accepted outline, as a fraction of the image area.
    pub min_area_frac: f64,
    /// Largest accepted outline, as a fraction of the image area.
    pub max_area_frac: f64,
}

impl Default for LocalizeConfig {
    fn default() -> Self {
        Self {
            polygon_epsilon_frac: 0.02,
            min_area_frac: 0.20,
            max_area_frac: 0.98,
        }
    }
}

/// Binarization and localization settings used by [`rectify`].
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    pub binarize: BinarizeConfig,
    pub localize: LocalizeConfig,
    /// Resampling of the binarized photo onto the canvas.
    pub interpolation: WarpInterpolation,
}

/// Canonical binary sheet produced by [`rectify`].
#[derive(Debug, Clone)]
pub struct RectifiedSheet {
    /// Bilevel image of exactly `paper.width × paper.height`.
    pub binary: GrayImage,
    /// Paper corners in the photo, ordered `[tl, tr, bl, br]`.
    pub corners: [[f64; 2]; 4],
    /// Photo → canvas mapping.
    pub projection: Projection,
}

/// Order four points as `[top-left, top-right, bottom-left, bottom-right]`.
///
/// The two points with the smallest `y` form the top edge; each pair is
/// split by `x`.
pub fn order_corners(quad: [[f64; 2]; 4]) -> [[f64; 2]; 4] {
    let mut pts = quad;
    pts.sort_by(|a, b| a[1].total_cmp(&b[1]));
    let (top, bottom) = pts.split_at_mut(2);
    top.sort_by(|a, b| a[0].total_cmp(&b[0]));
    bottom.sort_by(|a, b| a[0].total_cmp(&b[0]));
    [top[0], top[1], bottom[0], bottom[1]]
}

/// Find the paper outline in a binary photo.
///
/// Candidates are convex 4-gons whose area lies within the configured
/// fraction of the image. They are ranked by bounding-box area; the runner-up
/// is taken when there is more than one, since the largest is usually the
/// boundary of the photo background itself.
pub fn find_sheet_quad(
    binary: &GrayImage,
    template: &SheetTemplate,
    config: &LocalizeConfig,
) -> Result<[[f64; 2]; 4], LocalizationError> {
    let (w, h) = binary.dimensions();
    let image_area = w as f64 * h as f64;
    let epsilon = config.polygon_epsilon_frac * template.diagonal();

    let contours = find_contours::<i32>(&ink_mask(binary));
    let mut candidates: Vec<(i64, [[f64; 2]; 4])> = Vec::new();

    for contour in &contours {
        let poly = approximate_closed(&contour.points, epsilon);
        if poly.len() != 4 || !is_convex(&poly) {
            continue;
        }
        let area = polygon_area(&poly);
        if area < config.min_area_frac * image_area || area > config.max_area_frac * image_area {
            continue;
        }
        let Some((x0, y0, x1, y1)) = bounding_box(&poly) else {
            continue;
        };
        let bbox_area = (x1 - x0) as i64 * (y1 - y0) as i64;
        let quad = [
            [poly[0].x as f64, poly[0].y as f64],
            [poly[1].x as f64, poly[1].y as f64],
            [poly[2].x as f64, poly[2].y as f64],
            [poly[3].x as f64, poly[3].y as f64],
        ];
        candidates.push((bbox_area, quad));
    }

    tracing::debug!(
        contours = contours.len(),
        candidates = candidates.len(),
        "paper outline candidates"
    );

    // Stable sort keeps contour order among equal boxes.
    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    let pick = match candidates.len() {
        0 => {
            return Err(LocalizationError::NoSheetFound {
                contours: contours.len(),
            })
        }
        1 => 0,
        _ => 1,
    };
    Ok(order_corners(candidates[pick].1))
}

/// Binarize, localize and warp a photo onto the template canvas.
pub fn rectify(
    gray: &GrayImage,
    template: &SheetTemplate,
    config: &RectifyConfig,
) -> Result<RectifiedSheet, LocalizationError> {
    let binary = adaptive_binarize(gray, &config.binarize);
    let corners = find_sheet_quad(&binary, template, &config.localize)?;

    let paper = template.paper();
    let projection = corner_projection(&corners, &canvas_corners(paper.width, paper.height))
        .ok_or(LocalizationError::DegenerateQuad { corners })?;

    let warped = warp_to_canvas(
        &binary,
        &projection,
        paper.width,
        paper.height,
        config.interpolation,
    );
    let binary = adaptive_binarize(&warped, &config.binarize);

    tracing::info!(
        tl = ?corners[0],
        br = ?corners[3],
        "sheet rectified to {}x{}",
        paper.width,
        paper.height
    );

    Ok(RectifiedSheet {
        binary,
        corners,
        projection,
    })
}
