use image::GrayImage;

use super::{CalibrationSummary, CellVerdict, GradeConfig, Recognition};
use crate::cell::extract_cells;
use crate::error::GradeError;
use crate::grid::calibrate;
use crate::localize::rectify;
use crate::sheet::assemble;
use crate::template::SheetTemplate;

/// Run every stage after rectification on a canonical bilevel sheet.
pub(crate) fn recognize_binary(
    binary: &GrayImage,
    template: &SheetTemplate,
    config: &GradeConfig,
    corners: Option<[[f64; 2]; 4]>,
) -> Result<Recognition, GradeError> {
    let calibration = calibrate(binary, template, &config.calibration)?;
    let cells = extract_cells(binary, &calibration, template)?;

    let verdicts: Vec<CellVerdict> = cells
        .iter()
        .map(|cell| {
            let d = cell.classify(&config.classifier);
            CellVerdict {
                label: cell.label,
                score: d.score,
                marked: d.marked,
            }
        })
        .collect();

    let labelled: Vec<_> = verdicts.iter().map(|v| (v.label, v.marked)).collect();
    let sheet = assemble(&labelled);

    tracing::info!(
        exam = sheet.exam_code(),
        version = sheet.version_code(),
        cells = verdicts.len(),
        marked = verdicts.iter().filter(|v| v.marked).count(),
        "sheet recognized"
    );

    Ok(Recognition {
        sheet,
        calibration: CalibrationSummary {
            n_vertical: calibration.vertical.len(),
            n_horizontal: calibration.horizontal.len(),
            cell_size: [calibration.cell_width, calibration.cell_height],
        },
        cells: verdicts,
        corners,
    })
}

/// Full pipeline on a grayscale photo.
pub(crate) fn recognize_photo(
    gray: &GrayImage,
    template: &SheetTemplate,
    config: &GradeConfig,
) -> Result<Recognition, GradeError> {
    let rectified = rectify(gray, template, &config.rectify)?;
    recognize_binary(&rectified.binary, template, config, Some(rectified.corners))
}
