use crate::cell::ExtractError;
use crate::grid::CalibrationError;
use crate::localize::LocalizationError;
use crate::score::{KeyError, VersionMismatchError};

/// Any failure of the recognition and grading pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum GradeError {
    /// No usable paper outline; ask for a new photo.
    Localization(LocalizationError),
    /// No alignment anchors on the rectified sheet; ask for a new photo.
    Calibration(CalibrationError),
    /// Cells could not be cut from the sheet.
    Extraction(ExtractError),
    VersionMismatch(VersionMismatchError),
    /// The photo was expected to be an answer key but is not one.
    NotAKeySheet { exam_code: u16, reserved: u16 },
    Key(KeyError),
}

impl GradeError {
    /// Whether retaking the photo may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Localization(_) | Self::Calibration(_))
    }
}

impl std::fmt::Display for GradeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Localization(e) => write!(f, "sheet localization failed: {}", e),
            Self::Calibration(e) => write!(f, "grid calibration failed: {}", e),
            Self::Extraction(e) => write!(f, "cell extraction failed: {}", e),
            Self::VersionMismatch(e) => write!(f, "{}", e),
            Self::NotAKeySheet {
                exam_code,
                reserved,
            } => write!(
                f,
                "exam code {:03} is not the answer-key code {:03}",
                exam_code, reserved
            ),
            Self::Key(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GradeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Localization(e) => Some(e),
            Self::Calibration(e) => Some(e),
            Self::Extraction(e) => Some(e),
            Self::VersionMismatch(e) => Some(e),
            Self::Key(e) => Some(e),
            Self::NotAKeySheet { .. } => None,
        }
    }
}

impl From<LocalizationError> for GradeError {
    fn from(e: LocalizationError) -> Self {
        Self::Localization(e)
    }
}

impl From<CalibrationError> for GradeError {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

impl From<ExtractError> for GradeError {
    fn from(e: ExtractError) -> Self {
        Self::Extraction(e)
    }
}

impl From<VersionMismatchError> for GradeError {
    fn from(e: VersionMismatchError) -> Self {
        Self::VersionMismatch(e)
    }
}

impl From<KeyError> for GradeError {
    fn from(e: KeyError) -> Self {
        Self::Key(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn stage_errors_convert_and_chain() {
        let e: GradeError = CalibrationError::NoAnchors { squares: 0 }.into();
        assert!(e.is_retryable());
        assert!(e.to_string().starts_with("grid calibration failed"));
        assert!(e.source().is_some());

        let e: GradeError = ExtractError::NotBinary.into();
        assert!(!e.is_retryable());
    }
}
