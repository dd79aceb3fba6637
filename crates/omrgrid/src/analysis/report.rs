use crate::score::AnswerKey;
use crate::sheet::{AnswerOption, AnswerSheet};

use super::AnalysisReport;

/// Formatting of the analysis table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Digits after the decimal point for statistics.
    pub decimals: usize,
    /// Placeholder for undefined statistics.
    pub undefined: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            decimals: 2,
            undefined: "---".to_string(),
        }
    }
}

impl ReportConfig {
    fn number(&self, value: Option<f64>) -> String {
        match value {
            Some(v) if v.is_finite() => format!("{:.*}", self.decimals, v),
            _ => self.undefined.clone(),
        }
    }
}

fn code(value: u16) -> String {
    format!("{:03}", value)
}

/// Table layout: header, key, one row per sheet, a blank separator, then
/// validity, difficulty, reliability and one tally row per option.
pub(super) fn build_rows(
    key: &AnswerKey,
    sheets: &[AnswerSheet],
    report: &AnalysisReport,
    config: &ReportConfig,
) -> Vec<Vec<String>> {
    let k = key.len();
    let mut rows = Vec::with_capacity(sheets.len() + 5 + AnswerOption::ALL.len());

    let mut header = vec!["Exam".to_string(), "Version".to_string()];
    header.extend((1..=k).map(|q| format!("Q{}", q)));
    header.push("Total".to_string());
    rows.push(header);

    let mut key_row = vec!["Key".to_string(), code(key.version_code)];
    key_row.extend(key.correct.iter().map(|o| o.to_string()));
    key_row.push(k.to_string());
    rows.push(key_row);

    for (sheet, total) in sheets.iter().zip(&report.totals) {
        let mut row = vec![code(sheet.exam_code()), code(sheet.version_code())];
        row.extend((0..k).map(|q| {
            sheet
                .answers()
                .get(q)
                .map(|a| a.chosen.to_string())
                .unwrap_or_default()
        }));
        row.push(total.to_string());
        rows.push(row);
    }

    rows.push(Vec::new());

    let mut validity = vec!["Validity".to_string(), String::new()];
    validity.extend(report.validity.iter().map(|v| config.number(*v)));
    rows.push(validity);

    let mut difficulty = vec!["Difficulty".to_string(), String::new()];
    difficulty.extend(report.difficulty.iter().map(|d| config.number(Some(*d))));
    rows.push(difficulty);

    rows.push(vec![
        "Reliability".to_string(),
        config.number(report.reliability),
    ]);

    for option in AnswerOption::ALL {
        let mut row = vec![option.to_string(), String::new()];
        row.extend(
            report
                .option_counts
                .iter()
                .map(|counts| counts[option.index()].to_string()),
        );
        rows.push(row);
    }
    rows
}

fn quote(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub(super) fn to_delimited(rows: &[Vec<String>], delimiter: char) -> String {
    let mut out = String::new();
    let sep = delimiter.to_string();
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| quote(f, delimiter)).collect();
        out.push_str(&fields.join(&sep));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::analyze;
    use super::*;
    use crate::sheet::{OptionSet, QuestionAnswer};

    fn sheet(exam: u16, answers: &[&str]) -> AnswerSheet {
        let answers = answers
            .iter()
            .enumerate()
            .map(|(i, s)| QuestionAnswer {
                question: i as u32 + 1,
                chosen: s.parse::<OptionSet>().unwrap(),
            })
            .collect();
        AnswerSheet::new(exam, 7, answers).unwrap()
    }

    fn report() -> AnalysisReport {
        let key = AnswerKey::from_letters(7, "ABC").unwrap();
        let sheets = vec![sheet(12, &["A", "B", "C"]), sheet(5, &["A", "AC", ""])];
        analyze(&key, &sheets, &ReportConfig::default()).unwrap()
    }

    #[test]
    fn rows_follow_table_layout() {
        let r = report();
        assert_eq!(r.rows[0], ["Exam", "Version", "Q1", "Q2", "Q3", "Total"]);
        assert_eq!(r.rows[1], ["Key", "007", "A", "B", "C", "3"]);
        assert_eq!(r.rows[2], ["012", "007", "A", "B", "C", "3"]);
        assert_eq!(r.rows[3], ["005", "007", "A", "AC", "", "1"]);
        assert!(r.rows[4].is_empty());
        assert_eq!(r.rows[5], ["Validity", "", "---", "1.00", "1.00"]);
        assert_eq!(r.rows[6], ["Difficulty", "", "0.00", "0.50", "0.50"]);
        // 3/2 · (1 − 0.5 / 1)
        assert_eq!(r.rows[7], ["Reliability", "0.75"]);
        assert_eq!(r.rows[8], ["A", "", "2", "1", "0"]);
        assert_eq!(r.rows[9], ["B", "", "0", "1", "0"]);
        assert_eq!(r.rows[10], ["C", "", "0", "1", "1"]);
        assert_eq!(r.rows.len(), 13);
    }

    #[test]
    fn decimals_and_marker_are_configurable() {
        let key = AnswerKey::from_letters(7, "AB").unwrap();
        let config = ReportConfig {
            decimals: 3,
            undefined: "n/a".to_string(),
        };
        let r = analyze(&key, &[sheet(1, &["A", "C"])], &config).unwrap();
        assert_eq!(r.rows[5], ["Validity", "", "n/a", "n/a"]);
        assert_eq!(r.rows[6], ["Difficulty", "", "0.000", "1.000"]);
        assert_eq!(r.rows[7], ["Reliability", "n/a"]);
    }

    #[test]
    fn delimited_output_has_one_line_per_row() {
        let r = report();
        let tsv = r.to_delimited('\t');
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), r.rows.len());
        assert_eq!(lines[0], "Exam\tVersion\tQ1\tQ2\tQ3\tTotal");
        assert_eq!(lines[4], "");

        let csv = r.to_delimited(',');
        assert!(csv.starts_with("Exam,Version,Q1"));
    }

    #[test]
    fn fields_containing_the_delimiter_are_quoted() {
        let rows = vec![vec!["a,b".to_string(), "say \"hi\"".to_string()]];
        assert_eq!(to_delimited(&rows, ','), "\"a,b\",\"say \"\"hi\"\"\"\n");
        assert_eq!(to_delimited(&rows, '\t'), "a,b\t\"say \"\"hi\"\"\"\n");
    }
}
