//! Shared test utilities: a sample layout, a synthetic sheet renderer and a
//! fake camera.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::geometric_transformations::{warp_into, Interpolation};
use imageproc::rect::Rect;

use crate::homography::{canvas_corners, corner_projection};
use crate::sheet::AnswerOption;
use crate::template::SheetTemplate;

/// 400×760 sheet, 24 px cells with a 2 px border.
///
/// Sheet rows 0..=9 hold the code digits, rows 11..=16 the answers; row 17
/// is the bottom anchor line.
pub(crate) const SAMPLE_TEMPLATE: &str = "\
# sample sheet used by the unit tests
Dim, 400, 760, 24, 24, 2, 1
ExCode, 0, 9, 1, 3, 3, 10, 0, 0
MCode, 0, 9, 5, 7, 3, 10, 0, 0
Part1, 11, 16, 1, 5, 5, 6, 1, A
Part2, 11, 16, 6, 8, 3, 6, 7, A
";

/// Geometry the sample template was written against.
pub(crate) struct SampleLayout {
    pub anchor_x: f64,
    pub first_row_y: f64,
    pub pitch: f64,
    pub vertical_anchors: usize,
    pub horizontal_anchors: usize,
    pub cell: u32,
    pub border: u32,
}

impl SampleLayout {
    pub fn row_y(&self, row: usize) -> f64 {
        self.first_row_y + row as f64 * self.pitch
    }

    pub fn column_x(&self, column: usize) -> f64 {
        self.anchor_x + column as f64 * self.pitch
    }

    pub fn bottom_y(&self) -> f64 {
        self.row_y(self.vertical_anchors - 1)
    }
}

pub(crate) const SAMPLE_LAYOUT: SampleLayout = SampleLayout {
    anchor_x: 30.0,
    first_row_y: 40.0,
    pitch: 40.0,
    vertical_anchors: 18,
    horizontal_anchors: 9,
    cell: 24,
    border: 2,
};

pub(crate) fn sample_template() -> SheetTemplate {
    SheetTemplate::parse(SAMPLE_TEMPLATE).expect("sample template parses")
}

/// Bubbles to fill in, as `(sheet row, sheet column)`.
#[derive(Debug, Clone, Default)]
pub(crate) struct SheetMarks {
    /// Bubbles carrying an X.
    pub crosses: Vec<(usize, usize)>,
    /// Bubbles blacked out completely.
    pub filled: Vec<(usize, usize)>,
}

impl SheetMarks {
    /// Marks for the given codes and per-question option letters on the
    /// sample layout (questions 1..=12, in order).
    pub fn encode(exam: u16, version: u16, answers: &[&str]) -> Self {
        let mut crosses = Vec::new();
        for (first_col, code) in [(1usize, exam), (5, version)] {
            let digits = [code / 100, (code / 10) % 10, code % 10];
            for (k, d) in digits.iter().enumerate() {
                crosses.push((*d as usize, first_col + k));
            }
        }
        for (i, letters) in answers.iter().enumerate() {
            let (row, first_col) = if i < 6 { (11 + i, 1) } else { (11 + i - 6, 6) };
            for c in letters.chars() {
                let option = AnswerOption::from_char(c).expect("option letter");
                crosses.push((row, first_col + option.index()));
            }
        }
        Self {
            crosses,
            filled: Vec::new(),
        }
    }
}

fn square_at(cx: f64, cy: f64, size: u32) -> Rect {
    let half = (size / 2) as i32;
    Rect::at(cx as i32 - half, cy as i32 - half).of_size(size, size)
}

/// Render the canonical (already rectified) sheet for the sample layout.
pub(crate) fn render_sheet(template: &SheetTemplate, marks: &SheetMarks) -> GrayImage {
    let paper = template.paper();
    let layout = &SAMPLE_LAYOUT;
    let mut img = GrayImage::from_pixel(paper.width, paper.height, Luma([255]));
    let ink = Luma([0u8]);

    for i in 0..layout.vertical_anchors {
        let r = square_at(layout.anchor_x, layout.row_y(i), layout.cell);
        draw_filled_rect_mut(&mut img, r, ink);
    }
    for j in 0..layout.horizontal_anchors {
        let r = square_at(layout.column_x(j), layout.bottom_y(), layout.cell);
        draw_filled_rect_mut(&mut img, r, ink);
    }

    for field in template.fields() {
        for r in 0..field.row_count {
            for c in 0..field.column_count {
                let (cx, cy) = (
                    layout.column_x(field.start_horizontal + c),
                    layout.row_y(field.start_vertical + r),
                );
                for k in 0..layout.border {
                    let r = square_at(cx, cy, layout.cell - 2 * k);
                    draw_hollow_rect_mut(&mut img, r, ink);
                }
            }
        }
    }

    let interior = layout.cell - 2 * layout.border;
    for &(row, col) in &marks.crosses {
        let (cx, cy) = (layout.column_x(col), layout.row_y(row));
        let r = square_at(cx, cy, interior);
        draw_x(&mut img, r.left() as u32, r.top() as u32, interior, 3.0, 2.0);
    }
    for &(row, col) in &marks.filled {
        let (cx, cy) = (layout.column_x(col), layout.row_y(row));
        draw_filled_rect_mut(&mut img, square_at(cx, cy, interior), ink);
    }
    img
}

fn segment_distance(p: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let l2 = dx * dx + dy * dy;
    let t = if l2 > 0.0 {
        (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / l2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (qx, qy) = (a[0] + t * dx, a[1] + t * dy);
    ((p[0] - qx).powi(2) + (p[1] - qy).powi(2)).sqrt()
}

/// Draw a straight stroke of the given width (pixel-center coverage).
pub(crate) fn draw_segment(img: &mut GrayImage, a: [f32; 2], b: [f32; 2], stroke: f32) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            if segment_distance(p, a, b) <= stroke / 2.0 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
    }
}

/// Draw a corner-to-corner X inside the `size × size` box at `(left, top)`,
/// inset by `margin`.
pub(crate) fn draw_x(
    img: &mut GrayImage,
    left: u32,
    top: u32,
    size: u32,
    margin: f32,
    stroke: f32,
) {
    let s = size as f32;
    let diagonals = [
        ([margin, margin], [s - margin, s - margin]),
        ([s - margin, margin], [margin, s - margin]),
    ];
    for y in 0..size {
        for x in 0..size {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            let hit = diagonals
                .iter()
                .any(|&(a, b)| segment_distance(p, a, b) <= stroke / 2.0);
            if hit && left + x < img.width() && top + y < img.height() {
                img.put_pixel(left + x, top + y, Luma([0]));
            }
        }
    }
}

/// A synthetic photo of a sheet.
pub(crate) struct Photo {
    pub image: GrayImage,
    /// Where the sheet corners landed, `[tl, tr, bl, br]`.
    pub corners: [[f64; 2]; 4],
}

/// Place the sheet under a mild perspective on a dark table.
pub(crate) fn photograph_sheet(sheet: &GrayImage) -> Photo {
    let (w, h) = sheet.dimensions();
    let (wf, hf) = (w as f64, h as f64);
    let corners = [
        [60.0, 50.0],
        [wf + 65.0, 70.0],
        [45.0, hf + 80.0],
        [wf + 80.0, hf + 100.0],
    ];
    let projection =
        corner_projection(&canvas_corners(w, h), &corners).expect("well-posed corners");

    let table = Luma([40u8]);
    let mut image = GrayImage::from_pixel(w + 120, h + 140, table);
    warp_into(sheet, &projection, Interpolation::Bilinear, table, &mut image);
    Photo { image, corners }
}

/// Place the sheet unrotated on a dark table with the given margin.
pub(crate) fn embed_sheet(sheet: &GrayImage, margin: u32) -> GrayImage {
    let (w, h) = sheet.dimensions();
    let mut image = GrayImage::from_pixel(w + 2 * margin, h + 2 * margin, Luma([40]));
    image::imageops::replace(&mut image, sheet, margin as i64, margin as i64);
    image
}
