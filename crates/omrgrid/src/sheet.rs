//! Answer options, cell labels and sheet assembly.

use std::collections::BTreeMap;
use std::fmt;

/// Number of answer options per question.
pub const OPTION_COUNT: usize = 5;
/// Number of digits in exam and version codes.
pub const CODE_DIGITS: usize = 3;

/// One of the five answer options. The ordinal is significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
    E,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; OPTION_COUNT] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parse an option letter (case-insensitive).
    pub fn from_char(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return None;
        }
        Self::from_index((upper as u8 - b'A') as usize)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_char(self) -> char {
        (b'A' + self as u8) as char
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Set of chosen options, indexed by option ordinal.
///
/// Serializes as the string of chosen letters, e.g. `"AC"` or `""`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OptionSet([bool; OPTION_COUNT]);

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(option: AnswerOption) -> Self {
        let mut s = Self::default();
        s.insert(option);
        s
    }

    pub fn insert(&mut self, option: AnswerOption) {
        self.0[option.index()] = true;
    }

    pub fn contains(&self, option: AnswerOption) -> bool {
        self.0[option.index()]
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The chosen option when exactly one is chosen.
    pub fn only(&self) -> Option<AnswerOption> {
        let mut it = self.iter();
        match (it.next(), it.next()) {
            (Some(o), None) => Some(o),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = AnswerOption> + '_ {
        AnswerOption::ALL.into_iter().filter(|o| self.contains(*o))
    }
}

impl fmt::Display for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for o in self.iter() {
            write!(f, "{}", o.as_char())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for OptionSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::default();
        for c in s.chars().filter(|c| !c.is_whitespace()) {
            let o = AnswerOption::from_char(c)
                .ok_or_else(|| format!("'{}' is not an answer option", c))?;
            set.insert(o);
        }
        Ok(set)
    }
}

impl serde::Serialize for OptionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for OptionSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What a bubble cell means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellLabel {
    Answer { question: u32, option: AnswerOption },
    ExamCodeDigit { column: usize, digit: u8 },
    VersionCodeDigit { column: usize, digit: u8 },
}

/// Chosen options for one question.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuestionAnswer {
    pub question: u32,
    pub chosen: OptionSet,
}

/// Recognized (and optionally scored) answer sheet.
///
/// `answers` and `verdicts` always have the same length; verdicts are only
/// meaningful once `scored` is set.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawAnswerSheet")]
pub struct AnswerSheet {
    exam_code: u16,
    version_code: u16,
    answers: Vec<QuestionAnswer>,
    scored: bool,
    verdicts: Vec<bool>,
}

#[derive(serde::Deserialize)]
struct RawAnswerSheet {
    exam_code: u16,
    version_code: u16,
    answers: Vec<QuestionAnswer>,
    #[serde(default)]
    scored: bool,
    #[serde(default)]
    verdicts: Vec<bool>,
}

impl TryFrom<RawAnswerSheet> for AnswerSheet {
    type Error = String;

    fn try_from(raw: RawAnswerSheet) -> Result<Self, Self::Error> {
        let mut sheet = AnswerSheet::new(raw.exam_code, raw.version_code, raw.answers)?;
        if raw.scored {
            if raw.verdicts.len() != sheet.answers.len() {
                return Err(format!(
                    "{} verdicts for {} answers",
                    raw.verdicts.len(),
                    sheet.answers.len()
                ));
            }
            sheet.verdicts = raw.verdicts;
            sheet.scored = true;
        }
        Ok(sheet)
    }
}

impl AnswerSheet {
    /// Build an unscored sheet. Codes must be in `0..=999`.
    pub fn new(
        exam_code: u16,
        version_code: u16,
        mut answers: Vec<QuestionAnswer>,
    ) -> Result<Self, String> {
        if exam_code > 999 || version_code > 999 {
            return Err(format!(
                "codes must be at most 999 (exam {}, version {})",
                exam_code, version_code
            ));
        }
        answers.sort_by_key(|a| a.question);
        let verdicts = vec![false; answers.len()];
        Ok(Self {
            exam_code,
            version_code,
            answers,
            scored: false,
            verdicts,
        })
    }

    pub fn exam_code(&self) -> u16 {
        self.exam_code
    }

    pub fn version_code(&self) -> u16 {
        self.version_code
    }

    /// Answers ordered by question number.
    pub fn answers(&self) -> &[QuestionAnswer] {
        &self.answers
    }

    pub fn is_scored(&self) -> bool {
        self.scored
    }

    pub fn verdicts(&self) -> &[bool] {
        &self.verdicts
    }

    /// Number of correct answers (0 until scored).
    pub fn total(&self) -> u32 {
        if !self.scored {
            return 0;
        }
        self.verdicts.iter().filter(|&&v| v).count() as u32
    }

    /// Whether this sheet carries the reserved answer-key exam code.
    pub fn is_key_sheet(&self, reserved_exam_code: u16) -> bool {
        self.exam_code == reserved_exam_code
    }

    pub(crate) fn set_verdicts(&mut self, verdicts: Vec<bool>) {
        debug_assert_eq!(verdicts.len(), self.answers.len());
        self.verdicts = verdicts;
        self.scored = true;
    }
}

fn code_value(digits: &[u8; CODE_DIGITS]) -> u16 {
    digits.iter().fold(0u16, |acc, &d| acc * 10 + d as u16)
}

/// Build a sheet from classified cells.
///
/// Codes start as `000`. A marked code cell writes its digit into its
/// column; when a column has several marks the last one in scan order wins.
/// Code cells whose digit is not 0-9 are skipped.
/// Every answer cell registers its question, so unanswered questions appear
/// with an empty set.
pub fn assemble(cells: &[(CellLabel, bool)]) -> AnswerSheet {
    let mut exam = [0u8; CODE_DIGITS];
    let mut version = [0u8; CODE_DIGITS];
    let mut exam_marks = [0usize; CODE_DIGITS];
    let mut version_marks = [0usize; CODE_DIGITS];
    let mut answers: BTreeMap<u32, OptionSet> = BTreeMap::new();

    for &(label, marked) in cells {
        let digit_out_of_range = match label {
            CellLabel::ExamCodeDigit { digit, .. } | CellLabel::VersionCodeDigit { digit, .. } => {
                digit > 9
            }
            CellLabel::Answer { .. } => false,
        };
        if digit_out_of_range {
            tracing::warn!(?label, "code cell digit is not 0-9, ignored");
            continue;
        }
        match label {
            CellLabel::Answer { question, option } => {
                let set = answers.entry(question).or_default();
                if marked {
                    set.insert(option);
                }
            }
            CellLabel::ExamCodeDigit { column, digit } if marked && column < CODE_DIGITS => {
                exam[column] = digit;
                exam_marks[column] += 1;
            }
            CellLabel::VersionCodeDigit { column, digit } if marked && column < CODE_DIGITS => {
                version[column] = digit;
                version_marks[column] += 1;
            }
            _ => {}
        }
    }

    for (name, marks) in [("exam", exam_marks), ("version", version_marks)] {
        for (column, &n) in marks.iter().enumerate() {
            if n > 1 {
                tracing::warn!(column, marks = n, "{} code column has several marks", name);
            }
        }
    }

    let answers: Vec<QuestionAnswer> = answers
        .into_iter()
        .map(|(question, chosen)| QuestionAnswer { question, chosen })
        .collect();
    let verdicts = vec![false; answers.len()];

    AnswerSheet {
        exam_code: code_value(&exam),
        version_code: code_value(&version),
        answers,
        scored: false,
        verdicts,
    }
}
