//! Bubble cell extraction.
//!
//! Each bubble's position is predicted from the anchor lines, then refined
//! by sliding a cell-sized frame over a search window and picking the offset
//! whose printed border carries the most ink. The printed border is scaled
//! to the measured cell size and rounded up before it is cut away.

use image::{imageops, GrayImage};
use imageproc::integral_image::{integral_image, sum_image_pixels};

use crate::grid::GridCalibration;
use crate::marker::{classify, ClassifierConfig, MarkDecision};
use crate::preprocess::{ink_mask, is_bilevel};
use crate::sheet::{AnswerOption, CellLabel};
use crate::template::{FieldKind, FieldSpec, PaperDimension, SheetTemplate};

/// Search window size relative to the calibrated cell size.
const WINDOW_SCALE: f64 = 1.5;

/// Which anchor line an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorLine {
    Vertical,
    Horizontal,
}

impl std::fmt::Display for AnchorLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertical => write!(f, "vertical"),
            Self::Horizontal => write!(f, "horizontal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// Input image is not bilevel.
    NotBinary,
    /// A field addresses an anchor that was not detected.
    AnchorOutOfRange {
        field: String,
        line: AnchorLine,
        index: usize,
        available: usize,
    },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotBinary => write!(f, "cell extraction requires a bilevel image"),
            Self::AnchorOutOfRange {
                field,
                line,
                index,
                available,
            } => write!(
                f,
                "field '{}' uses {} anchor {} but only {} were found",
                field, line, index, available
            ),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Interior pixels of one bubble and what the bubble means.
#[derive(Debug, Clone)]
pub struct BubbleCell {
    pub pixels: GrayImage,
    pub label: CellLabel,
}

impl BubbleCell {
    pub fn classify(&self, config: &ClassifierConfig) -> MarkDecision {
        classify(&self.pixels, config)
    }
}

/// Evenly spaced positions from `a` to `b` inclusive; one point sits on `a`.
fn lerp_points(a: f64, b: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![a; n];
    }
    (0..n)
        .map(|i| a + (b - a) * i as f64 / (n - 1) as f64)
        .collect()
}

fn anchor_center(
    field: &FieldSpec,
    anchors: &[crate::grid::Anchor],
    line: AnchorLine,
    index: usize,
) -> Result<[f64; 2], ExtractError> {
    anchors
        .get(index)
        .map(|a| a.center())
        .ok_or_else(|| ExtractError::AnchorOutOfRange {
            field: field.kind.label().to_string(),
            line,
            index,
            available: anchors.len(),
        })
}

fn cell_label(field: &FieldSpec, row: usize, col: usize) -> Option<CellLabel> {
    let row_value = field.start_row_value.checked_add(u32::try_from(row).ok()?)?;
    match field.kind {
        FieldKind::Answers { .. } => {
            let first = AnswerOption::from_char(field.start_column)?;
            Some(CellLabel::Answer {
                question: row_value,
                option: AnswerOption::from_index(first.index().checked_add(col)?)?,
            })
        }
        FieldKind::ExamCode => Some(CellLabel::ExamCodeDigit {
            column: field.start_column_digit().checked_add(col)?,
            digit: u8::try_from(row_value).ok()?,
        }),
        FieldKind::VersionCode => Some(CellLabel::VersionCodeDigit {
            column: field.start_column_digit().checked_add(col)?,
            digit: u8::try_from(row_value).ok()?,
        }),
    }
}

/// Ink counts over the bilevel sheet.
struct InkIntegral {
    integral: image::ImageBuffer<image::Luma<u64>, Vec<u64>>,
}

impl InkIntegral {
    fn new(binary: &GrayImage) -> Self {
        Self {
            integral: integral_image::<_, u64>(&ink_mask(binary)),
        }
    }

    /// Ink pixels in the `w × h` rectangle at `(x, y)`.
    fn count(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        if w == 0 || h == 0 {
            return 0;
        }
        sum_image_pixels(&self.integral, x, y, x + w - 1, y + h - 1)[0] / 255
    }
}

/// Cell geometry shared by every bubble of a sheet.
#[derive(Debug, Clone, Copy)]
struct CellGeometry {
    width: u32,
    height: u32,
    border: u32,
    window_w: u32,
    window_h: u32,
}

impl CellGeometry {
    fn new(calibration: &GridCalibration, paper: &PaperDimension) -> Self {
        let width = calibration.cell_width.round().max(1.0) as u32;
        let height = calibration.cell_height.round().max(1.0) as u32;
        let scale = (calibration.cell_width / paper.cell_width.max(1) as f64)
            .max(calibration.cell_height / paper.cell_height.max(1) as f64);
        Self {
            width,
            height,
            border: measured_border(paper.cell_border_thickness, scale),
            window_w: (WINDOW_SCALE * calibration.cell_width).round() as u32,
            window_h: (WINDOW_SCALE * calibration.cell_height).round() as u32,
        }
    }
}

/// Printed border thickness at `scale`, rounded up so that a border drawn
/// thicker by resampling is still cut away whole.
fn measured_border(printed: u32, scale: f64) -> u32 {
    if !scale.is_finite() || scale <= 0.0 {
        return printed;
    }
    (printed as f64 * scale).ceil() as u32
}

/// Best-aligned interior crop around a predicted center.
fn locate_cell(
    binary: &GrayImage,
    ink: &InkIntegral,
    geom: &CellGeometry,
    center: [f64; 2],
) -> GrayImage {
    let (img_w, img_h) = binary.dimensions();
    let clip = |start: f64, len: u32, limit: u32| -> (u32, u32) {
        let s = start.round();
        let lo = s.max(0.0).min(limit as f64) as u32;
        let hi = (s + len as f64).max(0.0).min(limit as f64) as u32;
        (lo, hi.saturating_sub(lo))
    };
    let (wx, ww) = clip(center[0] - geom.window_w as f64 / 2.0, geom.window_w, img_w);
    let (wy, wh) = clip(center[1] - geom.window_h as f64 / 2.0, geom.window_h, img_h);

    let inner_w = geom.width.saturating_sub(2 * geom.border);
    let inner_h = geom.height.saturating_sub(2 * geom.border);

    if ww < geom.width || wh < geom.height {
        return imageops::crop_imm(binary, wx, wy, 0, 0).to_image();
    }

    let mut best = (i64::MIN, 0u32, 0u32);
    for oy in 0..=(wh - geom.height) {
        for ox in 0..=(ww - geom.width) {
            let x = wx + ox;
            let y = wy + oy;
            let outside = ink.count(x, y, geom.width, geom.height) as i64;
            let inside =
                ink.count(x + geom.border, y + geom.border, inner_w, inner_h) as i64;
            let score = outside - inside;
            if score > best.0 {
                best = (score, ox, oy);
            }
        }
    }

    let (_, ox, oy) = best;
    imageops::crop_imm(
        binary,
        wx + ox + geom.border,
        wy + oy + geom.border,
        inner_w,
        inner_h,
    )
    .to_image()
}

fn extract_with(
    binary: &GrayImage,
    ink: &InkIntegral,
    calibration: &GridCalibration,
    field: &FieldSpec,
    geom: &CellGeometry,
) -> Result<Vec<BubbleCell>, ExtractError> {
    let v0 = anchor_center(field, &calibration.vertical, AnchorLine::Vertical, field.start_vertical)?;
    let v1 = anchor_center(field, &calibration.vertical, AnchorLine::Vertical, field.end_vertical)?;
    let h0 = anchor_center(
        field,
        &calibration.horizontal,
        AnchorLine::Horizontal,
        field.start_horizontal,
    )?;
    let h1 = anchor_center(
        field,
        &calibration.horizontal,
        AnchorLine::Horizontal,
        field.end_horizontal,
    )?;

    let rows = lerp_points(v0[1], v1[1], field.row_count);
    let cols = lerp_points(h0[0], h1[0], field.column_count);

    let mut cells = Vec::with_capacity(field.cell_count());
    for (r, &cy) in rows.iter().enumerate() {
        for (c, &cx) in cols.iter().enumerate() {
            let Some(label) = cell_label(field, r, c) else {
                continue;
            };
            cells.push(BubbleCell {
                pixels: locate_cell(binary, ink, geom, [cx, cy]),
                label,
            });
        }
    }
    Ok(cells)
}

/// Extract every bubble of one field, row-major.
pub fn extract_field(
    binary: &GrayImage,
    calibration: &GridCalibration,
    field: &FieldSpec,
    paper: &PaperDimension,
) -> Result<Vec<BubbleCell>, ExtractError> {
    if !is_bilevel(binary) {
        return Err(ExtractError::NotBinary);
    }
    let ink = InkIntegral::new(binary);
    let geom = CellGeometry::new(calibration, paper);
    extract_with(binary, &ink, calibration, field, &geom)
}

/// Extract every bubble of every field, in template order.
pub fn extract_cells(
    binary: &GrayImage,
    calibration: &GridCalibration,
    template: &SheetTemplate,
) -> Result<Vec<BubbleCell>, ExtractError> {
    if !is_bilevel(binary) {
        return Err(ExtractError::NotBinary);
    }
    let ink = InkIntegral::new(binary);
    let geom = CellGeometry::new(calibration, template.paper());

    let mut cells = Vec::new();
    for field in template.fields() {
        cells.extend(extract_with(binary, &ink, calibration, field, &geom)?);
    }
    tracing::debug!(
        cells = cells.len(),
        fields = template.fields().len(),
        border = geom.border,
        "cells extracted"
    );
    Ok(cells)
}
