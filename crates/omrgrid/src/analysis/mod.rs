//! Item analysis over a batch of sheets answering one exam version.
//!
//! Correctness is recomputed from the key with the scoring rule, so sheets
//! may be passed scored or unscored.

mod report;
mod stats;

use std::fmt;

use crate::score::{verdicts, AnswerKey};
use crate::sheet::{AnswerSheet, OPTION_COUNT};

pub use report::ReportConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    NoSheets,
    /// Sheet at `index` was printed for another version than the key.
    VersionMismatch {
        index: usize,
        exam_code: u16,
        sheet: u16,
        key: u16,
    },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSheets => write!(f, "analysis needs at least one sheet"),
            Self::VersionMismatch {
                index,
                exam_code,
                sheet,
                key,
            } => write!(
                f,
                "sheet #{} (exam {:03}) has version {:03}, key has {:03}",
                index, exam_code, sheet, key
            ),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Per-question statistics and the printable table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisReport {
    pub n_sheets: usize,
    /// `option_counts[q][o]`: sheets that chose option `o` on question `q`.
    pub option_counts: Vec<[u32; OPTION_COUNT]>,
    /// Fraction of sheets answering each question incorrectly.
    pub difficulty: Vec<f64>,
    /// Item-total correlation, `None` when undefined.
    pub validity: Vec<Option<f64>>,
    /// KR-20, `None` when undefined.
    pub reliability: Option<f64>,
    /// Correct answers per sheet, in input order.
    pub totals: Vec<u32>,
    pub rows: Vec<Vec<String>>,
}

impl AnalysisReport {
    /// Render `rows` as delimited text, one record per line.
    pub fn to_delimited(&self, delimiter: char) -> String {
        report::to_delimited(&self.rows, delimiter)
    }
}

/// Analyze `sheets` against `key`.
///
/// Every sheet must carry the key's version code; a mismatch aborts before
/// any statistic is computed. Question count is taken from the key.
pub fn analyze(
    key: &AnswerKey,
    sheets: &[AnswerSheet],
    config: &ReportConfig,
) -> Result<AnalysisReport, AnalysisError> {
    if sheets.is_empty() {
        return Err(AnalysisError::NoSheets);
    }
    if let Some((index, s)) = sheets
        .iter()
        .enumerate()
        .find(|(_, s)| s.version_code() != key.version_code)
    {
        return Err(AnalysisError::VersionMismatch {
            index,
            exam_code: s.exam_code(),
            sheet: s.version_code(),
            key: key.version_code,
        });
    }

    let k = key.len();
    let n = sheets.len();

    let correct: Vec<Vec<bool>> = sheets
        .iter()
        .map(|s| {
            let mut v = verdicts(s, key);
            v.resize(k, false);
            v
        })
        .collect();
    let totals: Vec<u32> = correct
        .iter()
        .map(|row| row.iter().filter(|&&c| c).count() as u32)
        .collect();
    let totals_f: Vec<f64> = totals.iter().map(|&t| t as f64).collect();

    let mut option_counts = vec![[0u32; OPTION_COUNT]; k];
    for sheet in sheets {
        for (q, answer) in sheet.answers().iter().take(k).enumerate() {
            for option in answer.chosen.iter() {
                option_counts[q][option.index()] += 1;
            }
        }
    }

    let mut difficulty = Vec::with_capacity(k);
    let mut validity = Vec::with_capacity(k);
    let mut p_correct = Vec::with_capacity(k);
    for q in 0..k {
        let item: Vec<f64> = correct
            .iter()
            .map(|row| if row[q] { 1.0 } else { 0.0 })
            .collect();
        let p = stats::mean(&item);
        p_correct.push(p);
        difficulty.push(1.0 - p);
        validity.push(stats::pearson(&item, &totals_f));
    }
    let reliability = stats::kr20(&p_correct, &totals_f);

    tracing::info!(
        sheets = n,
        questions = k,
        reliability = ?reliability,
        "item analysis complete"
    );

    let mut report = AnalysisReport {
        n_sheets: n,
        option_counts,
        difficulty,
        validity,
        reliability,
        totals,
        rows: Vec::new(),
    };
    report.rows = report::build_rows(key, sheets, &report, config);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{OptionSet, QuestionAnswer};
    use approx::assert_relative_eq;

    fn sheet(exam: u16, version: u16, answers: &[&str]) -> AnswerSheet {
        let answers = answers
            .iter()
            .enumerate()
            .map(|(i, s)| QuestionAnswer {
                question: i as u32 + 1,
                chosen: s.parse::<OptionSet>().unwrap(),
            })
            .collect();
        AnswerSheet::new(exam, version, answers).unwrap()
    }

    fn five_question_batch() -> (AnswerKey, Vec<AnswerSheet>) {
        let key = AnswerKey::from_letters(7, "ABCDE").unwrap();
        let sheets = vec![
            sheet(1, 7, &["A", "B", "C", "D", "E"]),
            sheet(2, 7, &["A", "A", "C", "D", "E"]),
            sheet(3, 7, &["E", "E", "E", "E", "E"]),
        ];
        (key, sheets)
    }

    #[test]
    fn five_question_scenario() {
        let (key, sheets) = five_question_batch();
        let r = analyze(&key, &sheets, &ReportConfig::default()).unwrap();

        // The third sheet's E on question 5 is correct.
        assert_eq!(r.totals, vec![5, 4, 1]);
        let expected = [1.0 / 3.0, 2.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 0.0];
        for (d, e) in r.difficulty.iter().zip(expected) {
            assert_relative_eq!(*d, e, epsilon = 1e-12);
        }
        assert_relative_eq!(r.reliability.unwrap(), 1.25 * 54.0 / 78.0, epsilon = 1e-12);
        assert_relative_eq!(r.validity[0].unwrap(), 21.0 / 468f64.sqrt(), epsilon = 1e-12);
        assert_eq!(r.validity[4], None);
        assert_eq!(r.option_counts[0], [2, 0, 0, 0, 1]);
        assert_eq!(r.option_counts[1], [1, 1, 0, 0, 1]);
    }

    #[test]
    fn difficulty_stays_in_unit_interval() {
        let key = AnswerKey::from_letters(0, "AB").unwrap();
        let sheets = vec![sheet(1, 0, &["AB", ""]), sheet(2, 0, &["A"])];
        let r = analyze(&key, &sheets, &ReportConfig::default()).unwrap();
        assert!(r.difficulty.iter().all(|d| (0.0..=1.0).contains(d)));
        assert_eq!(r.totals, vec![0, 1]);
    }

    #[test]
    fn single_sheet_has_no_reliability() {
        let key = AnswerKey::from_letters(0, "ABC").unwrap();
        let r = analyze(&key, &[sheet(1, 0, &["A", "C", "C"])], &ReportConfig::default()).unwrap();
        assert_eq!(r.reliability, None);
        assert!(r.validity.iter().all(Option::is_none));
    }

    #[test]
    fn mismatched_version_aborts() {
        let (key, mut sheets) = five_question_batch();
        sheets.push(sheet(9, 8, &["A"]));
        assert_eq!(
            analyze(&key, &sheets, &ReportConfig::default()),
            Err(AnalysisError::VersionMismatch {
                index: 3,
                exam_code: 9,
                sheet: 8,
                key: 7
            })
        );
    }

    #[test]
    fn empty_batch_is_rejected() {
        let key = AnswerKey::from_letters(0, "A").unwrap();
        assert_eq!(
            analyze(&key, &[], &ReportConfig::default()),
            Err(AnalysisError::NoSheets)
        );
    }

    #[test]
    fn scored_and_unscored_sheets_agree() {
        let (key, sheets) = five_question_batch();
        let mut scored = sheets.clone();
        for s in &mut scored {
            crate::score::score_sheet(s, &key).unwrap();
        }
        let a = analyze(&key, &sheets, &ReportConfig::default()).unwrap();
        let b = analyze(&key, &scored, &ReportConfig::default()).unwrap();
        assert_eq!(a, b);
    }
}
