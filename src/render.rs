//! Server-side HTML for the five views.

use minijinja::{Environment, context};
use serde::Serialize;

use crate::adapter::Answer;
use crate::error::{ExamPrepError, Result};
use crate::models::{ModelOption, Subject};
use crate::session::{Session, View};
use crate::validation::{DEFAULT_QUESTIONS, MAX_QUESTIONS, MIN_QUESTIONS};

pub const NO_TEXT_WARNING: &str =
    "No text extracted from PDF. Ensure the PDF is text-based, not scanned.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A question with its model answer, as shown under the form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
    pub confidence: String,
}

impl AnsweredQuestion {
    pub fn new(question: &str, answer: &Answer) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.text.clone(),
            confidence: format!("{:.2}", answer.score),
        }
    }
}

/// What a single request produced on top of the session state
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewOutcome {
    pub notices: Vec<Notice>,
    /// A model failed to load; the view's inputs are hidden
    pub blocked: bool,
    pub answer: Option<AnsweredQuestion>,
    pub explanation: Option<String>,
    pub explained_turn: Option<usize>,
}

impl ViewOutcome {
    pub fn from_error(err: &ExamPrepError) -> Self {
        let mut outcome = Self::default();
        outcome.push_error(err);
        outcome
    }

    pub fn push_error(&mut self, err: &ExamPrepError) {
        if err.is_blocking() {
            self.blocked = true;
        }
        let notice = match err {
            ExamPrepError::Validation { reason, .. } => Notice::warning(reason.clone()),
            other if other.is_warning() => Notice::warning(other.to_string()),
            other => Notice::error(other.to_string()),
        };
        self.notices.push(notice);
    }

    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }
}

#[derive(Debug, Serialize)]
struct MenuItem {
    slug: String,
    title: &'static str,
    active: bool,
}

#[derive(Debug, Serialize)]
struct TurnView<'a> {
    index: usize,
    question: &'a str,
    answer: &'a str,
    confidence: Option<String>,
}

pub struct Renderer {
    env: Environment<'static>,
    app_title: String,
}

impl Renderer {
    pub fn new(app_title: &str) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("layout.html", include_str!("../templates/layout.html"))?;
        env.add_template("home.html", include_str!("../templates/home.html"))?;
        env.add_template("upload.html", include_str!("../templates/upload.html"))?;
        env.add_template("generate.html", include_str!("../templates/generate.html"))?;
        env.add_template("chat.html", include_str!("../templates/chat.html"))?;
        env.add_template("settings.html", include_str!("../templates/settings.html"))?;
        Ok(Self {
            env,
            app_title: app_title.to_string(),
        })
    }

    pub fn render(
        &self,
        view: View,
        session: &Session,
        outcome: &ViewOutcome,
        qa_catalog: &[ModelOption],
        gen_catalog: &[ModelOption],
    ) -> Result<String> {
        let menu: Vec<MenuItem> = View::all()
            .into_iter()
            .map(|v| MenuItem {
                slug: v.to_string(),
                title: v.title(),
                active: v == view,
            })
            .collect();

        let chat_history: Vec<TurnView> = session
            .chat_history()
            .iter()
            .enumerate()
            .map(|(index, turn)| TurnView {
                index,
                question: &turn.question,
                answer: &turn.answer,
                confidence: turn.score.map(|s| format!("{s:.2}")),
            })
            .collect();

        let subjects: Vec<String> = Subject::all().iter().map(Subject::label).collect();
        let download_name = session
            .practice
            .as_ref()
            .map(|p| p.subject.download_file_name());

        let template = self.env.get_template(&format!("{view}.html"))?;
        let html = template.render(context! {
            app_title => &self.app_title,
            title => view.title(),
            view => view.to_string(),
            menu => menu,
            notices => &outcome.notices,
            blocked => outcome.blocked,
            answer => &outcome.answer,
            explanation => &outcome.explanation,
            explained_turn => outcome.explained_turn,
            qa_model => &session.qa_model,
            gen_model => &session.gen_model,
            qa_catalog => qa_catalog,
            gen_catalog => gen_catalog,
            document => &session.document,
            has_text => session.document.as_ref().is_some_and(|d| !d.extracted.is_empty()),
            chat_history => chat_history,
            practice => &session.practice,
            download_name => download_name,
            subjects => subjects,
            min_questions => MIN_QUESTIONS,
            max_questions => MAX_QUESTIONS,
            default_questions => DEFAULT_QUESTIONS,
        })?;
        Ok(html)
    }
}
