use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Form};
use serde::Deserialize;
use std::sync::Arc;

use super::{CurrentSession, page};
use crate::error::{ExamPrepError, Result};
use crate::render::ViewOutcome;
use crate::service::ExamPrepService;
use crate::session::View;

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainTurnForm {
    #[serde(default)]
    pub turn: Option<String>,
}

pub async fn send_message(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    Form(form): Form<ChatForm>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    session.touch();
    let outcome = service.send_chat(&mut session, &form.message).await;
    page(&service, &session, &outcome)
}

pub async fn explain_answer(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    Form(form): Form<ExplainTurnForm>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    session.touch();
    let outcome = match form.turn.as_deref().map(str::trim).map(str::parse::<usize>) {
        Some(Ok(turn)) => service.explain_turn(&mut session, turn).await,
        _ => {
            session.active_view = View::Chat;
            ViewOutcome::from_error(&ExamPrepError::validation(
                "turn",
                "Choose a chat answer to explain.",
            ))
        }
    };
    page(&service, &session, &outcome)
}
