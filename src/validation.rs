use std::str::FromStr;

use crate::error::{ExamPrepError, Result};
use crate::models::Subject;

pub const MIN_QUESTIONS: u8 = 1;
pub const MAX_QUESTIONS: u8 = 10;
pub const DEFAULT_QUESTIONS: u8 = 5;

const MAX_TOPIC_CHARS: usize = 200;

/// Checks form input before it reaches a model
#[derive(Debug, Clone)]
pub struct InputValidator {
    max_question_chars: usize,
}

impl InputValidator {
    pub fn new(max_question_chars: usize) -> Self {
        Self { max_question_chars }
    }

    /// Returns the trimmed question
    pub fn validate_question<'a>(&self, field: &str, text: &'a str) -> Result<&'a str> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ExamPrepError::validation(field, "Please enter a question."));
        }
        if trimmed.chars().count() > self.max_question_chars {
            return Err(ExamPrepError::validation(
                field,
                format!("must be at most {} characters", self.max_question_chars),
            ));
        }
        Ok(trimmed)
    }

    pub fn validate_topic<'a>(&self, topic: &'a str) -> Result<&'a str> {
        let trimmed = topic.trim();
        if trimmed.is_empty() {
            return Err(ExamPrepError::validation(
                "topic",
                "Please enter a topic to generate questions.",
            ));
        }
        if trimmed.chars().count() > MAX_TOPIC_CHARS {
            return Err(ExamPrepError::validation(
                "topic",
                format!("must be at most {MAX_TOPIC_CHARS} characters"),
            ));
        }
        Ok(trimmed)
    }

    pub fn validate_question_count(&self, count: u8) -> Result<u8> {
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&count) {
            return Err(ExamPrepError::validation(
                "num_questions",
                format!("must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}"),
            ));
        }
        Ok(count)
    }

    /// Parses the raw form value, then range-checks it
    pub fn parse_question_count(&self, raw: &str) -> Result<u8> {
        let count = raw.trim().parse::<u8>().map_err(|_| {
            ExamPrepError::validation(
                "num_questions",
                format!("must be a whole number between {MIN_QUESTIONS} and {MAX_QUESTIONS}"),
            )
        })?;
        self.validate_question_count(count)
    }

    pub fn validate_subject(&self, subject: &str) -> Result<Subject> {
        Subject::from_str(subject.trim())
            .map_err(|_| ExamPrepError::validation("subject", format!("unknown subject '{subject}'")))
    }
}
