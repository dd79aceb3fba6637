use crate::grid::CalibrationConfig;
use crate::localize::RectifyConfig;
use crate::marker::ClassifierConfig;

/// Exam code reserved for answer-key sheets.
pub const DEFAULT_KEY_EXAM_CODE: u16 = 999;

/// Top-level recognition configuration.
///
/// Every section defaults independently, so a partial JSON document only
/// overrides what it names.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GradeConfig {
    pub rectify: RectifyConfig,
    pub calibration: CalibrationConfig,
    pub classifier: ClassifierConfig,
    /// Sheets with this exam code are answer keys.
    pub key_exam_code: u16,
}

impl Default for GradeConfig {
    fn default() -> Self {
        Self {
            rectify: RectifyConfig::default(),
            calibration: CalibrationConfig::default(),
            classifier: ClassifierConfig::default(),
            key_exam_code: DEFAULT_KEY_EXAM_CODE,
        }
    }
}
