use crate::sheet::{AnswerSheet, CellLabel};

/// Classifier outcome for one bubble.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CellVerdict {
    pub label: CellLabel,
    pub score: f32,
    pub marked: bool,
}

/// Anchor lines found on the rectified sheet.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationSummary {
    pub n_vertical: usize,
    pub n_horizontal: usize,
    /// Measured `[width, height]` of a bubble cell in canonical pixels.
    pub cell_size: [f64; 2],
}

/// Everything recognized on one photo.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Recognition {
    pub sheet: AnswerSheet,
    pub calibration: CalibrationSummary,
    pub cells: Vec<CellVerdict>,
    /// Paper corners in the photo `[tl, tr, bl, br]`, when localization ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corners: Option<[[f64; 2]; 4]>,
}

impl Recognition {
    /// Number of bubbles classified as marked.
    pub fn n_marked(&self) -> usize {
        self.cells.iter().filter(|c| c.marked).count()
    }
}
