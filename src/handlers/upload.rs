use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::{Extension, Form};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{CurrentSession, page};
use crate::error::{ExamPrepError, Result};
use crate::render::ViewOutcome;
use crate::service::{ExamPrepService, UploadedFile};
use crate::session::View;

#[derive(Debug, Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainForm {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub confidence: Option<String>,
}

struct UploadForm {
    file: Option<UploadedFile>,
    question: Option<String>,
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm> {
    let mut form = UploadForm {
        file: None,
        question: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ExamPrepError::validation("file", format!("Failed to read upload: {e}"))
    })? {
        match field.name().unwrap_or_default() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ExamPrepError::validation("file", format!("Failed to read file: {e}"))
                })?;
                debug!(file_name = %file_name, size = bytes.len(), "Received upload");
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "question" => {
                let text = field.text().await.map_err(|e| {
                    ExamPrepError::validation("question", format!("Failed to read question: {e}"))
                })?;
                form.question = Some(text);
            }
            _ => {}
        }
    }
    Ok(form)
}

/// `POST /upload` (multipart: `file`, optional `question`)
pub async fn upload_paper(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    mut multipart: Multipart,
) -> Result<Response> {
    let form = read_upload_form(&mut multipart).await;

    let mut session = handle.lock().await;
    session.touch();
    let outcome = match form {
        Ok(UploadForm {
            file: Some(file),
            question,
        }) => {
            service
                .upload_document(&mut session, file, question.as_deref())
                .await
        }
        Ok(UploadForm { file: None, .. }) => {
            session.active_view = View::Upload;
            ViewOutcome::from_error(&ExamPrepError::validation(
                "file",
                "Please choose a PDF file to upload.",
            ))
        }
        Err(e) => {
            session.active_view = View::Upload;
            ViewOutcome::from_error(&e)
        }
    };
    page(&service, &session, &outcome)
}

pub async fn ask_question(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    Form(form): Form<AskForm>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    session.touch();
    let outcome = service.ask_document(&mut session, &form.question).await;
    page(&service, &session, &outcome)
}

pub async fn explain_answer(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    Form(form): Form<ExplainForm>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    session.touch();
    let outcome = service
        .explain_answer(
            &mut session,
            &form.question,
            &form.answer,
            form.confidence.as_deref(),
        )
        .await;
    page(&service, &session, &outcome)
}
