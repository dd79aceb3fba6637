//! Alignment-anchor detection and grid calibration.
//!
//! Sheets carry solid squares down the left margin (the vertical line, one
//! per bubble row) and along the bottom margin (the horizontal line, one per
//! bubble column). Field specs address rows and columns through indices into
//! these two lines.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

use crate::polygon::{approximate_closed, bounding_box, is_convex, polygon_area};
use crate::preprocess::{ink_mask, is_bilevel, INK};
use crate::template::SheetTemplate;

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// No solid square qualified as an anchor.
    NoAnchors { squares: usize },
    /// Input image is not bilevel.
    NotBinary,
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAnchors { squares } => write!(
                f,
                "no solid alignment anchors found ({} square outlines inspected)",
                squares
            ),
            Self::NotBinary => write!(f, "calibration requires a bilevel image"),
        }
    }
}

impl std::error::Error for CalibrationError {}

/// Anchor search parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Polygon simplification tolerance as a fraction of the cell size.
    pub anchor_epsilon_frac: f64,
    /// Minimum outline area as a fraction of the template cell area.
    ///
    /// The traced outline runs through boundary pixel centers, so a printed
    /// square of side `s` encloses about `(s-1)²`.
    pub min_area_ratio: f64,
    /// Minimum ink fraction of the bounding box.
    pub min_solidity: f64,
    /// Max distance of a line member from the seed anchor's center.
    pub line_tolerance_px: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            anchor_epsilon_frac: 0.1,
            min_area_ratio: 0.5,
            min_solidity: 0.8,
            line_tolerance_px: 10.0,
        }
    }
}

/// Axis-aligned bounding box of a printed alignment square.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Anchor {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Anchor {
    pub fn center(&self) -> [f64; 2] {
        [
            self.left as f64 + self.width as f64 / 2.0,
            self.top as f64 + self.height as f64 / 2.0,
        ]
    }
}

/// Anchor lines and measured cell size of a rectified sheet.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GridCalibration {
    /// Left-margin anchors, top to bottom.
    pub vertical: Vec<Anchor>,
    /// Bottom-margin anchors, left to right.
    pub horizontal: Vec<Anchor>,
    /// Mean width of the horizontal anchors.
    pub cell_width: f64,
    /// Mean height of the vertical anchors.
    pub cell_height: f64,
}

fn ink_fraction(binary: &GrayImage, a: &Anchor) -> f64 {
    let mut ink = 0usize;
    for y in a.top..a.top + a.height {
        for x in a.left..a.left + a.width {
            if binary.get_pixel(x, y)[0] == INK {
                ink += 1;
            }
        }
    }
    ink as f64 / (a.width as f64 * a.height as f64)
}

/// Solid convex quadrilaterals of roughly cell size.
fn find_solid_squares(
    binary: &GrayImage,
    template: &SheetTemplate,
    config: &CalibrationConfig,
) -> (usize, Vec<Anchor>) {
    let paper = template.paper();
    let epsilon = config.anchor_epsilon_frac * paper.cell_width.min(paper.cell_height) as f64;
    let min_area = config.min_area_ratio * template.cell_area();

    let mut squares = 0usize;
    let mut anchors = Vec::new();
    for contour in find_contours::<i32>(&ink_mask(binary)) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let poly = approximate_closed(&contour.points, epsilon);
        if poly.len() != 4 || !is_convex(&poly) || polygon_area(&poly) <= min_area {
            continue;
        }
        squares += 1;

        let Some((x0, y0, x1, y1)) = bounding_box(&contour.points) else {
            continue;
        };
        let anchor = Anchor {
            left: x0.max(0) as u32,
            top: y0.max(0) as u32,
            width: (x1 - x0 + 1) as u32,
            height: (y1 - y0 + 1) as u32,
        };
        if ink_fraction(binary, &anchor) > config.min_solidity {
            anchors.push(anchor);
        }
    }
    (squares, anchors)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Locate the anchor lines on a rectified bilevel sheet.
pub fn calibrate(
    binary: &GrayImage,
    template: &SheetTemplate,
    config: &CalibrationConfig,
) -> Result<GridCalibration, CalibrationError> {
    if !is_bilevel(binary) {
        return Err(CalibrationError::NotBinary);
    }

    let (squares, anchors) = find_solid_squares(binary, template, config);
    tracing::debug!(squares, anchors = anchors.len(), "anchor candidates");

    let leftmost = anchors
        .iter()
        .min_by(|a, b| a.center()[0].total_cmp(&b.center()[0]))
        .copied()
        .ok_or(CalibrationError::NoAnchors { squares })?;
    let bottommost = anchors
        .iter()
        .max_by(|a, b| a.center()[1].total_cmp(&b.center()[1]))
        .copied()
        .ok_or(CalibrationError::NoAnchors { squares })?;

    let tol = config.line_tolerance_px;
    let mut vertical: Vec<Anchor> = anchors
        .iter()
        .filter(|a| (a.center()[0] - leftmost.center()[0]).abs() <= tol)
        .copied()
        .collect();
    let mut horizontal: Vec<Anchor> = anchors
        .iter()
        .filter(|a| (a.center()[1] - bottommost.center()[1]).abs() <= tol)
        .copied()
        .collect();
    vertical.sort_by(|a, b| a.center()[1].total_cmp(&b.center()[1]));
    horizontal.sort_by(|a, b| a.center()[0].total_cmp(&b.center()[0]));

    let cell_height = mean(vertical.iter().map(|a| a.height as f64));
    let cell_width = mean(horizontal.iter().map(|a| a.width as f64));

    tracing::info!(
        vertical = vertical.len(),
        horizontal = horizontal.len(),
        cell_width,
        cell_height,
        "grid calibrated"
    );

    Ok(GridCalibration {
        vertical,
        horizontal,
        cell_width,
        cell_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{render_sheet, sample_template, SheetMarks, SAMPLE_LAYOUT};
    use approx::assert_relative_eq;
    use image::Luma;

    #[test]
    fn finds_both_anchor_lines_on_canonical_sheet() {
        let template = sample_template();
        let sheet = render_sheet(&template, &SheetMarks::default());
        let cal = calibrate(&sheet, &template, &CalibrationConfig::default()).unwrap();

        assert_eq!(cal.vertical.len(), SAMPLE_LAYOUT.vertical_anchors);
        assert_eq!(cal.horizontal.len(), SAMPLE_LAYOUT.horizontal_anchors);
        assert_relative_eq!(cal.cell_width, 24.0, epsilon = 1e-9);
        assert_relative_eq!(cal.cell_height, 24.0, epsilon = 1e-9);

        for w in cal.vertical.windows(2) {
            assert!(w[0].center()[1] < w[1].center()[1]);
        }
        for w in cal.horizontal.windows(2) {
            assert!(w[0].center()[0] < w[1].center()[0]);
        }
        // The corner anchor closes both lines.
        assert_eq!(cal.vertical.last(), cal.horizontal.first());
    }

    #[test]
    fn anchor_centers_match_layout() {
        let template = sample_template();
        let sheet = render_sheet(&template, &SheetMarks::default());
        let cal = calibrate(&sheet, &template, &CalibrationConfig::default()).unwrap();
        for (i, a) in cal.vertical.iter().enumerate() {
            assert_relative_eq!(a.center()[0], SAMPLE_LAYOUT.anchor_x, epsilon = 1e-9);
            assert_relative_eq!(a.center()[1], SAMPLE_LAYOUT.row_y(i), epsilon = 1e-9);
        }
        for (j, a) in cal.horizontal.iter().enumerate() {
            assert_relative_eq!(a.center()[0], SAMPLE_LAYOUT.column_x(j), epsilon = 1e-9);
        }
    }

    #[test]
    fn filled_bubbles_do_not_join_the_lines() {
        let template = sample_template();
        let marks = SheetMarks {
            filled: vec![(3, 2), (16, 8)],
            ..SheetMarks::default()
        };
        let sheet = render_sheet(&template, &marks);
        let cal = calibrate(&sheet, &template, &CalibrationConfig::default()).unwrap();
        assert_eq!(cal.vertical.len(), SAMPLE_LAYOUT.vertical_anchors);
        assert_eq!(cal.horizontal.len(), SAMPLE_LAYOUT.horizontal_anchors);
    }

    #[test]
    fn blank_page_has_no_anchors() {
        let template = sample_template();
        let img = GrayImage::from_pixel(100, 100, Luma([255]));
        assert!(matches!(
            calibrate(&img, &template, &CalibrationConfig::default()),
            Err(CalibrationError::NoAnchors { .. })
        ));
    }

    #[test]
    fn hollow_squares_are_not_anchors() {
        let template = sample_template();
        let mut img = GrayImage::from_pixel(100, 100, Luma([255]));
        imageproc::drawing::draw_hollow_rect_mut(
            &mut img,
            imageproc::rect::Rect::at(20, 20).of_size(24, 24),
            Luma([0]),
        );
        assert!(matches!(
            calibrate(&img, &template, &CalibrationConfig::default()),
            Err(CalibrationError::NoAnchors { squares: 1 })
        ));
    }

    #[test]
    fn gray_input_is_rejected() {
        let template = sample_template();
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        assert_eq!(
            calibrate(&img, &template, &CalibrationConfig::default()),
            Err(CalibrationError::NotBinary)
        );
    }
}
