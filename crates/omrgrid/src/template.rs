//! Runtime sheet layout template.
//!
//! Templates are line-oriented text. Blank lines and lines starting with `#`
//! are ignored. Exactly one `Dim` line gives the paper geometry:
//!
//! ```text
//! Dim, width, height, cellWidth, cellHeight, cellBorderThickness, scale
//! ```
//!
//! Every other line describes one field of bubbles anchored to the printed
//! alignment squares:
//!
//! ```text
//! label, startV, endV, startH, endH, columnCount, rowCount, startRowValue, startColumnChar
//! ```
//!
//! Anchor spans are only checked at extraction time because the number of
//! detected anchors depends on the photo.

use std::fmt;
use std::str::FromStr;

use crate::sheet::{AnswerOption, CODE_DIGITS, OPTION_COUNT};

const DIM_KEYWORD: &str = "Dim";
const DIM_FIELDS: usize = 7;
const FIELD_RECORD_FIELDS: usize = 9;

const EXAM_CODE_LABEL: &str = "ExCode";
const VERSION_CODE_LABEL: &str = "MCode";

/// Error raised while parsing a template. Parsing is all-or-nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    MissingDim,
    DuplicateDim { line: usize },
    FieldCount { line: usize, expected: usize, found: usize },
    InvalidNumber { line: usize, value: String },
    InvalidValue { line: usize, reason: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDim => write!(f, "template has no '{}' line", DIM_KEYWORD),
            Self::DuplicateDim { line } => {
                write!(f, "line {}: second '{}' line", line, DIM_KEYWORD)
            }
            Self::FieldCount {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {}: expected {} comma-separated fields, found {}",
                line, expected, found
            ),
            Self::InvalidNumber { line, value } => {
                write!(f, "line {}: '{}' is not a valid number", line, value)
            }
            Self::InvalidValue { line, reason } => write!(f, "line {}: {}", line, reason),
        }
    }
}

impl std::error::Error for TemplateError {}

/// Paper geometry in canonical pixels (already multiplied by `scale`).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PaperDimension {
    pub width: u32,
    pub height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub cell_border_thickness: u32,
    /// Scale factor the raw template values were multiplied by.
    pub scale: f64,
}

/// What a field's bubbles encode.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldKind {
    /// Exam identifier digits (`ExCode`).
    ExamCode,
    /// Answer-key version digits (`MCode`).
    VersionCode,
    /// A block of questions; rows are questions, columns are options.
    Answers { name: String },
}

impl FieldKind {
    fn from_label(label: &str) -> Self {
        match label {
            EXAM_CODE_LABEL => Self::ExamCode,
            VERSION_CODE_LABEL => Self::VersionCode,
            other => Self::Answers {
                name: other.to_string(),
            },
        }
    }

    /// Template label for this kind.
    pub fn label(&self) -> &str {
        match self {
            Self::ExamCode => EXAM_CODE_LABEL,
            Self::VersionCode => VERSION_CODE_LABEL,
            Self::Answers { name } => name,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Self::ExamCode | Self::VersionCode)
    }
}

/// One rectangular block of bubbles addressed through anchor indices.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldSpec {
    pub kind: FieldKind,
    /// Index into the vertical anchor line (sorted by y) of the first row.
    pub start_vertical: usize,
    /// Index into the vertical anchor line of the last row.
    pub end_vertical: usize,
    /// Index into the horizontal anchor line (sorted by x) of the first column.
    pub start_horizontal: usize,
    /// Index into the horizontal anchor line of the last column.
    pub end_horizontal: usize,
    pub column_count: usize,
    pub row_count: usize,
    /// Value of the first row: first question number, or first digit value.
    pub start_row_value: u32,
    /// Value of the first column: first option letter, or first digit position.
    pub start_column: char,
}

impl FieldSpec {
    /// Number of bubble cells in this field.
    pub fn cell_count(&self) -> usize {
        self.row_count * self.column_count
    }

    /// Zero-based digit position of the first column of a code field.
    pub fn start_column_digit(&self) -> usize {
        self.start_column.to_digit(10).unwrap_or(0) as usize
    }
}

/// Parsed sheet layout template.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SheetTemplate {
    paper: PaperDimension,
    fields: Vec<FieldSpec>,
}

impl SheetTemplate {
    /// Parse template text.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut paper: Option<PaperDimension> = None;
        let mut fields = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with(DIM_KEYWORD) {
                if paper.is_some() {
                    return Err(TemplateError::DuplicateDim { line: line_no });
                }
                paper = Some(parse_dim(line, line_no)?);
            } else {
                fields.push(parse_field(line, line_no)?);
            }
        }

        let paper = paper.ok_or(TemplateError::MissingDim)?;
        Ok(Self { paper, fields })
    }

    /// Build a template from parts, applying the same checks as [`Self::parse`].
    ///
    /// Errors report `line: 0` for the paper and `line: i + 1` for `fields[i]`.
    pub fn from_parts(
        paper: PaperDimension,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, TemplateError> {
        validate_paper(&paper, 0)?;
        for (i, field) in fields.iter().enumerate() {
            validate_field(field, i + 1)?;
        }
        Ok(Self { paper, fields })
    }

    pub fn paper(&self) -> &PaperDimension {
        &self.paper
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Expected bubble cell area in canonical pixels.
    pub fn cell_area(&self) -> f64 {
        self.paper.cell_width as f64 * self.paper.cell_height as f64
    }

    /// Diagonal of the canonical sheet in pixels.
    pub fn diagonal(&self) -> f64 {
        let w = self.paper.width as f64;
        let h = self.paper.height as f64;
        (w * w + h * h).sqrt()
    }

    /// Total number of questions over all answer fields.
    pub fn question_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Answers { .. }))
            .map(|f| f.row_count)
            .sum()
    }
}

impl FromStr for SheetTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn split_record(line: &str, line_no: usize, expected: usize) -> Result<Vec<&str>, TemplateError> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() != expected {
        return Err(TemplateError::FieldCount {
            line: line_no,
            expected,
            found: parts.len(),
        });
    }
    Ok(parts)
}

fn parse_number<T: FromStr>(value: &str, line_no: usize) -> Result<T, TemplateError> {
    value.parse().map_err(|_| TemplateError::InvalidNumber {
        line: line_no,
        value: value.to_string(),
    })
}

fn parse_dim(line: &str, line_no: usize) -> Result<PaperDimension, TemplateError> {
    let parts = split_record(line, line_no, DIM_FIELDS)?;
    if parts[0] != DIM_KEYWORD {
        return Err(TemplateError::InvalidValue {
            line: line_no,
            reason: format!("unexpected keyword '{}'", parts[0]),
        });
    }

    let mut raw = [0.0f64; DIM_FIELDS - 1];
    for (slot, value) in raw.iter_mut().zip(&parts[1..]) {
        *slot = parse_number(value, line_no)?;
    }
    let [width, height, cell_width, cell_height, border, scale] = raw;

    if !scale.is_finite() || scale <= 0.0 {
        return Err(TemplateError::InvalidValue {
            line: line_no,
            reason: "scale must be finite and > 0".to_string(),
        });
    }

    let scaled = |v: f64, name: &str| -> Result<u32, TemplateError> {
        let s = (v * scale).round();
        if !s.is_finite() || s < 0.0 || s > u32::MAX as f64 {
            return Err(TemplateError::InvalidValue {
                line: line_no,
                reason: format!("{} is out of range", name),
            });
        }
        Ok(s as u32)
    };

    let paper = PaperDimension {
        width: scaled(width, "width")?,
        height: scaled(height, "height")?,
        cell_width: scaled(cell_width, "cellWidth")?,
        cell_height: scaled(cell_height, "cellHeight")?,
        cell_border_thickness: scaled(border, "cellBorderThickness")?,
        scale,
    };
    validate_paper(&paper, line_no)?;
    Ok(paper)
}

fn validate_paper(paper: &PaperDimension, line_no: usize) -> Result<(), TemplateError> {
    let invalid = |reason: &str| TemplateError::InvalidValue {
        line: line_no,
        reason: reason.to_string(),
    };

    if paper.width == 0 || paper.height == 0 {
        return Err(invalid("paper width and height must be > 0"));
    }
    if paper.cell_width == 0 || paper.cell_height == 0 {
        return Err(invalid("cell width and height must be > 0"));
    }
    if paper.cell_width > paper.width || paper.cell_height > paper.height {
        return Err(invalid("cell must fit inside the paper"));
    }
    let narrow_side = u64::from(paper.cell_width.min(paper.cell_height));
    if 2 * u64::from(paper.cell_border_thickness) >= narrow_side {
        return Err(invalid("cell border must be thinner than half the cell"));
    }
    Ok(())
}

fn parse_field(line: &str, line_no: usize) -> Result<FieldSpec, TemplateError> {
    let parts = split_record(line, line_no, FIELD_RECORD_FIELDS)?;

    let label = parts[0];
    if label.is_empty() {
        return Err(TemplateError::InvalidValue {
            line: line_no,
            reason: "field label must not be empty".to_string(),
        });
    }

    let mut chars = parts[8].chars();
    let start_column = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return Err(TemplateError::InvalidValue {
                line: line_no,
                reason: format!("start column '{}' must be a single character", parts[8]),
            })
        }
    };

    let field = FieldSpec {
        kind: FieldKind::from_label(label),
        start_vertical: parse_number(parts[1], line_no)?,
        end_vertical: parse_number(parts[2], line_no)?,
        start_horizontal: parse_number(parts[3], line_no)?,
        end_horizontal: parse_number(parts[4], line_no)?,
        column_count: parse_number(parts[5], line_no)?,
        row_count: parse_number(parts[6], line_no)?,
        start_row_value: parse_number(parts[7], line_no)?,
        start_column,
    };
    validate_field(&field, line_no)?;
    Ok(field)
}

fn validate_field(field: &FieldSpec, line_no: usize) -> Result<(), TemplateError> {
    let invalid = |reason: String| TemplateError::InvalidValue {
        line: line_no,
        reason,
    };

    if field.row_count == 0 || field.column_count == 0 {
        return Err(invalid("row and column counts must be >= 1".to_string()));
    }
    let last_row_value = u32::try_from(field.row_count - 1)
        .ok()
        .and_then(|extra| field.start_row_value.checked_add(extra))
        .ok_or_else(|| {
            invalid(format!(
                "field '{}': {} rows from {} overflow the row numbering",
                field.kind.label(),
                field.row_count,
                field.start_row_value
            ))
        })?;

    match &field.kind {
        FieldKind::Answers { name } => {
            let first = AnswerOption::from_char(field.start_column).ok_or_else(|| {
                invalid(format!(
                    "field '{}': start column '{}' is not an answer option",
                    name, field.start_column
                ))
            })?;
            let past_last = first.index().checked_add(field.column_count);
            if past_last.map_or(true, |end| end > OPTION_COUNT) {
                return Err(invalid(format!(
                    "field '{}': {} columns from '{}' run past option '{}'",
                    name,
                    field.column_count,
                    field.start_column,
                    AnswerOption::E.as_char()
                )));
            }
        }
        kind => {
            if last_row_value > 9 {
                return Err(invalid(format!(
                    "field '{}': digit rows run past 9",
                    kind.label()
                )));
            }
            if !field.start_column.is_ascii_digit() {
                return Err(invalid(format!(
                    "field '{}': start column '{}' must be a digit position",
                    kind.label(),
                    field.start_column
                )));
            }
            let past_last = field.start_column_digit().checked_add(field.column_count);
            if past_last.map_or(true, |end| end > CODE_DIGITS) {
                return Err(invalid(format!(
                    "field '{}': code fields hold at most {} digits",
                    kind.label(),
                    CODE_DIGITS
                )));
            }
        }
    }
    Ok(())
}
