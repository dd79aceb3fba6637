//! Answer keys and per-sheet scoring.

use std::fmt;

use crate::sheet::{AnswerOption, AnswerSheet};

/// Correct option per question, for one version of the exam.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnswerKey {
    pub version_code: u16,
    /// Correct option of the `i`-th answered question, in question order.
    pub correct: Vec<AnswerOption>,
}

/// The sheet was printed for a different version than the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionMismatchError {
    pub sheet: u16,
    pub key: u16,
}

impl fmt::Display for VersionMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sheet version {:03} does not match key version {:03}",
            self.sheet, self.key
        )
    }
}

impl std::error::Error for VersionMismatchError {}

/// A key sheet could not be turned into an answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key questions must carry exactly one mark.
    AmbiguousAnswer { question: u32, marks: usize },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousAnswer { question, marks } => write!(
                f,
                "key question {} has {} marks, expected exactly one",
                question, marks
            ),
        }
    }
}

impl std::error::Error for KeyError {}

impl AnswerKey {
    pub fn new(version_code: u16, correct: Vec<AnswerOption>) -> Self {
        Self {
            version_code,
            correct,
        }
    }

    /// Parse a key from a letter string such as `"ABCDE"`.
    pub fn from_letters(version_code: u16, letters: &str) -> Option<Self> {
        let correct = letters
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(AnswerOption::from_char)
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(version_code, correct))
    }

    /// Build a key from a recognized key sheet.
    pub fn from_sheet(sheet: &AnswerSheet) -> Result<Self, KeyError> {
        let correct = sheet
            .answers()
            .iter()
            .map(|a| {
                a.chosen.only().ok_or(KeyError::AmbiguousAnswer {
                    question: a.question,
                    marks: a.chosen.len(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(sheet.version_code(), correct))
    }

    pub fn len(&self) -> usize {
        self.correct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correct.is_empty()
    }
}

/// Per-question correctness of `sheet` against `key`, by position.
///
/// A question is correct iff exactly the key's option was chosen. Questions
/// past the end of the key are incorrect.
pub(crate) fn verdicts(sheet: &AnswerSheet, key: &AnswerKey) -> Vec<bool> {
    sheet
        .answers()
        .iter()
        .enumerate()
        .map(|(i, a)| {
            key.correct
                .get(i)
                .is_some_and(|&k| a.chosen.only() == Some(k))
        })
        .collect()
}

/// Score `sheet` in place and return the number of correct answers.
///
/// On a version mismatch the sheet is left untouched.
pub fn score_sheet(sheet: &mut AnswerSheet, key: &AnswerKey) -> Result<u32, VersionMismatchError> {
    if sheet.version_code() != key.version_code {
        return Err(VersionMismatchError {
            sheet: sheet.version_code(),
            key: key.version_code,
        });
    }
    if sheet.answers().len() != key.len() {
        tracing::warn!(
            sheet = sheet.answers().len(),
            key = key.len(),
            "sheet and key have different question counts"
        );
    }

    sheet.set_verdicts(verdicts(sheet, key));
    let total = sheet.total();
    tracing::debug!(exam = sheet.exam_code(), total, "sheet scored");
    Ok(total)
}
