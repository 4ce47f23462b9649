use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Form};
use serde::Deserialize;
use std::sync::Arc;

use super::{CurrentSession, page};
use crate::error::Result;
use crate::service::ExamPrepService;

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub qa_model: String,
    #[serde(default)]
    pub gen_model: String,
}

pub async fn save_settings(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    Form(form): Form<SettingsForm>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    session.touch();
    let outcome = service
        .update_settings(&mut session, &form.qa_model, &form.gen_model)
        .await;
    page(&service, &session, &outcome)
}
