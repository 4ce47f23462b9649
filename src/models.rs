use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Which pipeline a model identifier is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum ModelRole {
    #[strum(serialize = "question-answering")]
    QuestionAnswering,
    #[strum(serialize = "text-generation")]
    TextGeneration,
}

/// Catalog entry shown on the Settings view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    pub label: String,
    pub id: String,
}

impl ModelOption {
    pub fn new(label: &str, id: &str) -> Self {
        Self {
            label: label.to_string(),
            id: id.to_string(),
        }
    }
}

/// Exam subjects offered on the Generate view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
pub enum Subject {
    #[strum(serialize = "Mathematics")]
    Mathematics,
    #[strum(serialize = "Reasoning")]
    Reasoning,
    #[strum(serialize = "General Awareness")]
    #[serde(rename = "General Awareness")]
    GeneralAwareness,
}

impl Subject {
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Name of the CBT syllabus section, as written in prompts.
    pub fn syllabus_name(&self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Reasoning => "General Intelligence & Reasoning",
            Subject::GeneralAwareness => "General Awareness",
        }
    }

    pub fn download_file_name(&self) -> String {
        format!("rrb_ntpc_{}_questions.txt", self.label())
    }

    pub fn all() -> Vec<Subject> {
        Subject::iter().collect()
    }
}

// Question-answering request: {"inputs": {"question": .., "context": ..}}
#[derive(Debug, Serialize, Clone)]
pub struct QaRequest {
    pub inputs: QaInputs,
}

#[derive(Debug, Serialize, Clone)]
pub struct QaInputs {
    pub question: String,
    pub context: String,
}

impl QaRequest {
    pub fn new(question: &str, context: &str) -> Self {
        Self {
            inputs: QaInputs {
                question: question.to_string(),
                context: context.to_string(),
            },
        }
    }
}

/// One extracted answer span
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QaAnswer {
    pub answer: String,
    pub score: f64,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

/// QA endpoints answer with one object, or a list when asked for top-k
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum QaResponse {
    Single(QaAnswer),
    Ranked(Vec<QaAnswer>),
}

impl QaResponse {
    pub fn into_best(self) -> Option<QaAnswer> {
        match self {
            QaResponse::Single(answer) => Some(answer),
            QaResponse::Ranked(answers) => answers.into_iter().next(),
        }
    }
}

// Text generation request format
#[derive(Debug, Serialize, Clone)]
pub struct GenerationRequest {
    pub inputs: String,
    pub parameters: GenerationParameters,
    pub options: InferenceOptions,
}

#[derive(Debug, Serialize, Clone)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub num_return_sequences: u32,
    pub return_full_text: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct InferenceOptions {
    pub wait_for_model: bool,
}

impl GenerationRequest {
    /// Always asks for exactly one sequence.
    pub fn new(prompt: String, max_new_tokens: u32) -> Self {
        Self {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens,
                num_return_sequences: 1,
                return_full_text: false,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        }
    }
}

// Text generation response format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneratedSequence {
    pub generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_subject_parsing_and_file_name() {
        let subject = Subject::from_str("General Awareness").expect("known subject");
        assert_eq!(subject, Subject::GeneralAwareness);
        assert!(Subject::from_str("Chemistry").is_err());
        assert_eq!(
            Subject::Mathematics.download_file_name(),
            "rrb_ntpc_Mathematics_questions.txt"
        );
        assert_eq!(
            Subject::Reasoning.syllabus_name(),
            "General Intelligence & Reasoning"
        );
        assert_eq!(Subject::all().len(), 3);
    }

    #[test]
    fn test_qa_response_shapes() {
        let single: QaResponse =
            serde_json::from_str(r#"{"answer": "60", "score": 0.91, "start": 10, "end": 12}"#)
                .expect("single answer");
        assert_eq!(single.into_best().map(|a| a.answer), Some("60".to_string()));

        let ranked: QaResponse = serde_json::from_str(
            r#"[{"answer": "60", "score": 0.8}, {"answer": "120", "score": 0.1}]"#,
        )
        .expect("ranked answers");
        let best = ranked.into_best().expect("first answer");
        assert_eq!(best.answer, "60");
        assert_eq!(best.start, None);

        let empty: QaResponse = serde_json::from_str("[]").expect("empty list");
        assert!(empty.into_best().is_none());
    }

    #[test]
    fn test_generation_request_wire_shape() {
        let req = GenerationRequest::new("Explain LCM".to_string(), 150);
        let json = serde_json::to_value(&req).expect("serializes");
        assert_eq!(json["inputs"], "Explain LCM");
        assert_eq!(json["parameters"]["max_new_tokens"], 150);
        assert_eq!(json["parameters"]["num_return_sequences"], 1);
        assert_eq!(json["parameters"]["return_full_text"], false);
        assert_eq!(json["options"]["wait_for_model"], true);
    }

    #[test]
    fn test_model_role_display() {
        assert_eq!(ModelRole::QuestionAnswering.to_string(), "question-answering");
        assert_eq!(ModelRole::TextGeneration.to_string(), "text-generation");
    }
}
