use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use std::sync::Arc;

use super::{CurrentSession, page};
use crate::error::Result;
use crate::service::ExamPrepService;

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub num_questions: String,
}

pub async fn generate_questions(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    Form(form): Form<GenerateForm>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    session.touch();
    let outcome = service
        .generate_practice(&mut session, &form.subject, &form.topic, &form.num_questions)
        .await;
    page(&service, &session, &outcome)
}

/// Last generated practice set as a `text/plain` attachment
pub async fn download_questions(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
) -> Response {
    let session = handle.lock().await;
    match service.practice_download(&session) {
        Some((file_name, text)) => (
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            text,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "No generated questions to download").into_response(),
    }
}
