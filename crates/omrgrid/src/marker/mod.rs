//! X-mark classification of a single bubble interior.
//!
//! Stages:
//! 1. ink mask with small-speck and frame-residue removal,
//! 2. crop to the ink bounding box,
//! 3. moment normalization onto an 11×11 grid ([`moments`]),
//! 4. re-centering and correlation against a fixed X kernel ([`kernel`]).

mod kernel;
mod moments;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use kernel::{correlate, recenter};
use moments::{normalize, InkBitmap};

/// Side of the normalized grid.
pub(crate) const GRID: usize = 11;

/// Normalized binary glyph, row-major.
pub(crate) type Grid = [[bool; GRID]; GRID];

/// Mark classifier parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Pixels below this value count as ink.
    pub ink_threshold: u8,
    /// 8-connected ink components smaller than this are ignored.
    pub min_component_px: u32,
    /// Components lying wholly within this many pixels of the crop edge are
    /// taken for printed-border residue and ignored.
    pub edge_band: u32,
    /// Samples per axis when resampling onto the grid.
    pub supersample: u32,
    /// Fraction of ink samples needed to set a grid cell.
    pub density_threshold: f32,
    /// Largest re-centering shift, in grid cells.
    pub recenter_radius: i32,
    /// Minimum kernel score for a cell to count as marked.
    pub mark_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ink_threshold: 128,
            min_component_px: 4,
            edge_band: 3,
            supersample: 4,
            density_threshold: 0.15,
            recenter_radius: 2,
            mark_threshold: 15.0,
        }
    }
}

/// Outcome for one cell.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkDecision {
    /// Kernel correlation, rounded to three significant digits.
    pub score: f32,
    pub marked: bool,
}

impl MarkDecision {
    const EMPTY: Self = Self {
        score: 0.0,
        marked: false,
    };
}

/// Decide whether a bubble interior carries an X mark.
///
/// Pure: the same pixels always give the same decision.
pub fn classify(cell: &GrayImage, config: &ClassifierConfig) -> MarkDecision {
    let ink = despeckled_ink(cell, config);
    let Some(glyph) = ink.crop_to_ink() else {
        return MarkDecision::EMPTY;
    };

    let grid = normalize(&glyph, config.supersample.max(1), config.density_threshold);
    let grid = recenter(&grid, config.recenter_radius);
    let score = round_significant(correlate(&grid) as f64, 3) as f32;

    MarkDecision {
        score,
        marked: score >= config.mark_threshold,
    }
}

fn despeckled_ink(cell: &GrayImage, config: &ClassifierConfig) -> InkBitmap {
    let (w, h) = cell.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (x, y, p) in cell.enumerate_pixels() {
        if p[0] < config.ink_threshold {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    // Narrow crops keep at least half their width clear of the band.
    let band = config.edge_band.min(w.min(h) / 4);
    let edge_distance = |x: u32, y: u32| x.min(y).min(w - 1 - x).min(h - 1 - y);

    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
    let n_labels = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut sizes = vec![0u32; n_labels + 1];
    let mut reaches_inside = vec![band == 0; n_labels + 1];
    for (x, y, p) in labels.enumerate_pixels() {
        let label = p[0] as usize;
        sizes[label] += 1;
        if edge_distance(x, y) >= band {
            reaches_inside[label] = true;
        }
    }

    let mut bitmap = InkBitmap::new(w as usize, h as usize);
    for (x, y, p) in labels.enumerate_pixels() {
        let label = p[0] as usize;
        if label != 0 && sizes[label] >= config.min_component_px && reaches_inside[label] {
            bitmap.set(x as usize, y as usize);
        }
    }
    bitmap
}

fn round_significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits - 1 - magnitude);
    (value * factor).round() / factor
}
