use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::extractor::ExtractedDocument;
use crate::models::Subject;

/// The five mutually exclusive screens, in menu order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum View {
    Home,
    Upload,
    Generate,
    Chat,
    Settings,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Home => "Home",
            View::Upload => "Upload Question Paper",
            View::Generate => "Generate Practice Questions",
            View::Chat => "Chat with AI",
            View::Settings => "Settings",
        }
    }

    /// Views that call a model and so need loaded handles
    pub fn needs_models(&self) -> bool {
        matches!(self, View::Upload | View::Generate | View::Chat)
    }

    pub fn all() -> Vec<View> {
        View::iter().collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub score: Option<f64>,
}

/// The question paper currently loaded in the Upload view
#[derive(Debug, Clone, Serialize)]
pub struct UploadedDocument {
    pub file_name: String,
    pub extracted: ExtractedDocument,
}

#[derive(Debug, Clone, Serialize)]
pub struct PracticeSet {
    pub subject: Subject,
    pub topic: String,
    pub count: u8,
    pub text: String,
}

/// Per-connection state; never shared between sessions
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub active_view: View,
    pub qa_model: String,
    pub gen_model: String,
    chat_history: Vec<ChatTurn>,
    pub document: Option<UploadedDocument>,
    pub practice: Option<PracticeSet>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(id: Uuid, qa_model: String, gen_model: String) -> Self {
        Self {
            id,
            active_view: View::Home,
            qa_model,
            gen_model,
            chat_history: Vec::new(),
            document: None,
            practice: None,
            last_active: Utc::now(),
        }
    }

    pub fn chat_history(&self) -> &[ChatTurn] {
        &self.chat_history
    }

    /// Turns are only ever appended
    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.chat_history.push(turn);
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn is_idle_for(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.last_active > ttl,
            Err(_) => false,
        }
    }
}

/// Guarded session; holding the lock marks the session busy, so a second
/// submission from the same browser waits for the first.
pub type SessionHandle = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    default_qa: String,
    default_gen: String,
}

impl SessionStore {
    pub fn new(default_qa: String, default_gen: String) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_qa,
            default_gen,
        }
    }

    /// Returns the session for `id`, creating one when the id is missing or
    /// unknown. The flag tells whether a new session was created.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SessionHandle, bool) {
        if let Some(id) = id {
            if let Some(handle) = self.sessions.read().await.get(&id) {
                return (id, Arc::clone(handle), false);
            }
        }

        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(Session::new(
            id,
            self.default_qa.clone(),
            self.default_gen.clone(),
        )));
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        tracing::info!(session = %id, "Created session");
        (id, handle, true)
    }

    /// Drops sessions idle longer than `ttl`. Busy sessions are kept.
    pub async fn purge_idle(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.is_idle_for(ttl, now),
            Err(_) => true,
        });
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::info!(purged, remaining = sessions.len(), "Purged idle sessions");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
