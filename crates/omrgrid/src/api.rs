//! High-level grading API.
//!
//! [`Grader`] is the primary entry point. It owns a parsed
//! [`SheetTemplate`] and a [`GradeConfig`]; create one per sheet layout and
//! reuse it for every photo.

use image::{DynamicImage, GrayImage};

use crate::error::GradeError;
use crate::pipeline::{self, GradeConfig, Recognition};
use crate::preprocess::to_gray;
use crate::score::{score_sheet, AnswerKey};
use crate::template::{SheetTemplate, TemplateError};

/// Recognizes and grades photos of one sheet layout.
///
/// # Examples
///
/// ```no_run
/// use omrgrid::{AnswerKey, Grader};
///
/// let template = std::fs::read_to_string("sheet.tpl").unwrap();
/// let grader = Grader::from_template_str(&template).unwrap();
/// let photo = image::open("photo.jpg").unwrap();
/// let key = AnswerKey::from_letters(1, "ABCDE").unwrap();
/// let graded = grader.grade(&photo, &key).unwrap();
/// println!("exam {:03}: {} correct", graded.sheet.exam_code(), graded.sheet.total());
/// ```
#[derive(Debug, Clone)]
pub struct Grader {
    template: SheetTemplate,
    config: GradeConfig,
}

impl Grader {
    /// Create a grader with default configuration.
    pub fn new(template: SheetTemplate) -> Self {
        Self::with_config(template, GradeConfig::default())
    }

    pub fn with_config(template: SheetTemplate, config: GradeConfig) -> Self {
        Self { template, config }
    }

    /// Parse template text and create a grader with default configuration.
    pub fn from_template_str(text: &str) -> Result<Self, TemplateError> {
        Ok(Self::new(SheetTemplate::parse(text)?))
    }

    pub fn template(&self) -> &SheetTemplate {
        &self.template
    }

    pub fn config(&self) -> &GradeConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut GradeConfig {
        &mut self.config
    }

    /// Recognize a photo: rectify, calibrate, extract, classify, assemble.
    pub fn recognize(&self, image: &DynamicImage) -> Result<Recognition, GradeError> {
        self.recognize_gray(&to_gray(image))
    }

    /// [`Grader::recognize`] for an image that is already grayscale.
    pub fn recognize_gray(&self, gray: &GrayImage) -> Result<Recognition, GradeError> {
        pipeline::recognize_photo(gray, &self.template, &self.config)
    }

    /// Recognize a sheet that is already rectified and bilevel (ink 0,
    /// paper 255) at the template's canonical size. Localization is skipped.
    pub fn recognize_rectified(&self, binary: &GrayImage) -> Result<Recognition, GradeError> {
        pipeline::recognize_binary(binary, &self.template, &self.config, None)
    }

    /// Recognize a photo and score it against `key`.
    pub fn grade(&self, image: &DynamicImage, key: &AnswerKey) -> Result<Recognition, GradeError> {
        let mut recognition = self.recognize(image)?;
        score_sheet(&mut recognition.sheet, key)?;
        Ok(recognition)
    }

    /// Recognize a photo of an answer-key sheet.
    ///
    /// The sheet must carry the reserved key exam code and exactly one mark
    /// per question.
    pub fn recognize_key(&self, image: &DynamicImage) -> Result<AnswerKey, GradeError> {
        let recognition = self.recognize(image)?;
        let sheet = &recognition.sheet;
        if !sheet.is_key_sheet(self.config.key_exam_code) {
            return Err(GradeError::NotAKeySheet {
                exam_code: sheet.exam_code(),
                reserved: self.config.key_exam_code,
            });
        }
        Ok(AnswerKey::from_sheet(sheet)?)
    }
}
