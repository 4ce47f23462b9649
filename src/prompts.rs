use crate::config::GenerationConfig;
use crate::models::Subject;

const CHAT_PREAMBLE: &str = "You are a helpful tutor for the RRB NTPC exams (CBT 1 & CBT 2), covering \
Mathematics, General Intelligence & Reasoning and General Awareness. \
Answer the student's question clearly and accurately.";

/// How an explanation is phrased
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationStyle {
    /// Step-by-step solution of a question paper item
    Solve,
    /// Longer explanation of a chat answer
    Detail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationPrompt {
    pub question: String,
    pub answer: String,
    pub style: ExplanationStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeQuestionPrompt {
    pub subject: Subject,
    pub topic: String,
    pub count: u8,
}

/// Only the latest message is sent; earlier turns stay in the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Explanation(ExplanationPrompt),
    PracticeQuestions(PracticeQuestionPrompt),
    Chat(ChatPrompt),
}

impl Prompt {
    pub fn explanation(question: &str, answer: &str, style: ExplanationStyle) -> Self {
        Prompt::Explanation(ExplanationPrompt {
            question: question.to_string(),
            answer: answer.to_string(),
            style,
        })
    }

    pub fn practice(subject: Subject, topic: &str, count: u8) -> Self {
        Prompt::PracticeQuestions(PracticeQuestionPrompt {
            subject,
            topic: topic.to_string(),
            count,
        })
    }

    pub fn chat(message: &str) -> Self {
        Prompt::Chat(ChatPrompt {
            message: message.to_string(),
        })
    }

    pub fn render(&self) -> String {
        match self {
            Prompt::Explanation(p) => match p.style {
                ExplanationStyle::Solve => format!(
                    "Explain how to solve this question: {} Answer: {}",
                    p.question, p.answer
                ),
                ExplanationStyle::Detail => {
                    format!("Explain in detail: {} Answer: {}", p.question, p.answer)
                }
            },
            Prompt::PracticeQuestions(p) => format!(
                "Generate {} RRB NTPC {} practice questions on {} with answers.",
                p.count,
                p.subject.syllabus_name(),
                p.topic
            ),
            Prompt::Chat(p) => format!("{CHAT_PREAMBLE}\n\nStudent: {}\nTutor:", p.message),
        }
    }

    /// Output budget for this kind of prompt
    pub fn max_new_tokens(&self, cfg: &GenerationConfig) -> u32 {
        match self {
            Prompt::Explanation(_) => cfg.explanation_max_tokens,
            Prompt::PracticeQuestions(_) => cfg.practice_max_tokens,
            Prompt::Chat(_) => cfg.chat_max_tokens,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Prompt::Explanation(_) => "explanation",
            Prompt::PracticeQuestions(_) => "practice_questions",
            Prompt::Chat(_) => "chat",
        }
    }
}
