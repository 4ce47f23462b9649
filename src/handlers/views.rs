use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use std::sync::Arc;

use super::{CurrentSession, page};
use crate::error::Result;
use crate::render::ViewOutcome;
use crate::service::ExamPrepService;
use crate::session::View;

/// `GET /` renders whatever view the session is on
pub async fn current_view(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    session.touch();
    let view = session.active_view;
    let outcome = service.open_view(&mut session, view).await;
    page(&service, &session, &outcome)
}

/// `GET /view/:view` switches the active view
pub async fn open_view(
    State(service): State<Arc<ExamPrepService>>,
    Extension(CurrentSession(handle)): Extension<CurrentSession>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let Ok(view) = slug.parse::<View>() else {
        return Ok((StatusCode::NOT_FOUND, format!("Unknown view '{slug}'")).into_response());
    };

    let mut session = handle.lock().await;
    session.touch();
    let outcome: ViewOutcome = service.open_view(&mut session, view).await;
    page(&service, &session, &outcome)
}
