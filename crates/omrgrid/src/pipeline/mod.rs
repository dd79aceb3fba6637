//! Recognition pipeline.
//!
//! Glue between the stages: rectify -> calibrate -> extract -> classify ->
//! assemble. Each stage lives in its own module; this layer only fixes the
//! call order and collects the per-cell verdicts.

mod config;
mod result;
mod run;

pub use config::GradeConfig;
pub use result::{CalibrationSummary, CellVerdict, Recognition};

pub(crate) use run::{recognize_binary, recognize_photo};
