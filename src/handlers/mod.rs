/// HTTP handlers for the five views
pub mod chat;
pub mod generate;
pub mod settings;
pub mod upload;
pub mod views;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::Result;
use crate::render::ViewOutcome;
use crate::service::ExamPrepService;
use crate::session::{Session, SessionHandle};

pub const SESSION_COOKIE: &str = "exam_prep_session";

/// Multipart framing on top of the configured upload size
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// The caller's session, attached by [`attach_session`]
#[derive(Clone)]
pub struct CurrentSession(pub SessionHandle);

pub fn router(service: Arc<ExamPrepService>) -> Router {
    let body_limit = service
        .config()
        .max_upload_bytes()
        .saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/", get(views::current_view))
        .route("/view/:view", get(views::open_view))
        .route("/settings", post(settings::save_settings))
        .route("/upload", post(upload::upload_paper))
        .route("/upload/ask", post(upload::ask_question))
        .route("/upload/explain", post(upload::explain_answer))
        .route("/generate", post(generate::generate_questions))
        .route("/generate/download", get(generate::download_questions))
        .route("/chat", post(chat::send_message))
        .route("/chat/explain", post(chat::explain_answer))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&service),
            attach_session,
        ))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Resolves the session cookie to a session, creating one on first visit.
async fn attach_session(
    State(service): State<Arc<ExamPrepService>>,
    mut req: Request,
    next: Next,
) -> Response {
    let requested = session_id_from_headers(req.headers());
    let (id, handle, created) = service.sessions().get_or_create(requested).await;
    req.extensions_mut().insert(CurrentSession(handle));

    let mut response = next.run(req).await;
    if created {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Failed to build session cookie: {}", e),
        }
    }
    response
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Render the session's active view with this request's outcome
pub(crate) fn page(
    service: &ExamPrepService,
    session: &Session,
    outcome: &ViewOutcome,
) -> Result<Response> {
    let html = service.render(session.active_view, session, outcome)?;
    Ok(Html(html).into_response())
}
