//! omrgrid — optical mark recognition for photographed answer sheets.
//!
//! The pipeline stages are:
//!
//! 1. **Preprocess** – grayscale conversion, adaptive binarization.
//! 2. **Localize** – paper outline search and perspective rectification onto
//!    the template canvas.
//! 3. **Grid** – alignment-anchor detection along the left and bottom margins.
//! 4. **Cell** – bubble extraction at anchor-line intersections, re-centered on
//!    the local ink density.
//! 5. **Marker** – X-mark classification by moment normalization and kernel
//!    correlation.
//! 6. **Sheet** – exam code, version code and answers from the cell verdicts.
//! 7. **Score / Analysis** – grading against an answer key and item statistics
//!    over a batch of sheets.
//!
//! # Public API
//! - [`Grader`] and [`SheetTemplate`] as primary entry points
//! - [`GradeConfig`] for tuning
//! - [`score_sheet`] and [`analyze`] for work on recognized sheets
//!
//! Stage functions are public for callers that need to run a single stage.

mod api;
mod error;
mod pipeline;
mod polygon;

pub mod analysis;
pub mod cell;
pub mod grid;
pub mod homography;
pub mod localize;
pub mod marker;
pub mod preprocess;
pub mod score;
pub mod sheet;
pub mod template;

#[cfg(test)]
pub(crate) mod test_utils;

pub use analysis::{analyze, AnalysisError, AnalysisReport, ReportConfig};
pub use api::Grader;
pub use error::GradeError;
pub use pipeline::{CalibrationSummary, CellVerdict, GradeConfig, Recognition};
pub use score::{score_sheet, AnswerKey, KeyError, VersionMismatchError};
pub use sheet::{AnswerOption, AnswerSheet, CellLabel, OptionSet, QuestionAnswer};
pub use template::{SheetTemplate, TemplateError};
