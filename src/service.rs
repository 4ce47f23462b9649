use std::sync::Arc;

use crate::adapter::InferenceAdapter;
use crate::config::{ChatMode, Config};
use crate::error::{ExamPrepError, Result};
use crate::extractor::DocumentExtractor;
use crate::models::ModelRole;
use crate::prompts::{ExplanationStyle, Prompt};
use crate::provider::{HubModelLoader, ModelHandles, ModelLoader, ModelProvider};
use crate::render::{AnsweredQuestion, NO_TEXT_WARNING, Notice, Renderer, ViewOutcome};
use crate::session::{ChatTurn, PracticeSet, Session, SessionStore, UploadedDocument, View};
use crate::transport::HubTransport;
use crate::validation::InputValidator;

const PDF_CONTENT_TYPES: [&str; 3] = ["application/pdf", "application/x-pdf", "application/octet-stream"];

/// A file received from the Upload form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// View operations behind the HTTP routes.
///
/// Every operation takes the caller's session exclusively and reports
/// failures inside the returned [`ViewOutcome`], so one failed model call
/// never disturbs the rest of the session.
pub struct ExamPrepService {
    config: Arc<Config>,
    provider: Arc<ModelProvider>,
    extractor: DocumentExtractor,
    adapter: InferenceAdapter,
    validator: InputValidator,
    renderer: Renderer,
    sessions: Arc<SessionStore>,
}

impl ExamPrepService {
    /// Service backed by the hosted inference API
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let transport = Arc::new(HubTransport::new(
            &config.inference.base_url,
            config.inference.api_token.clone(),
            config.inference_timeout(),
        )?);
        let loader = Arc::new(HubModelLoader::new(
            transport,
            config.inference.verify_on_load,
        ));
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: Arc<Config>, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        tracing::info!("ExamPrepService::with_loader() - Starting initialization");
        let provider = Arc::new(ModelProvider::new(
            loader,
            config.models.qa_catalog.clone(),
            config.models.gen_catalog.clone(),
        ));
        let sessions = Arc::new(SessionStore::new(
            config.default_qa_model(),
            config.default_gen_model(),
        ));
        let renderer = Renderer::new("RRB NTPC Exam Preparation AI Agent")?;
        tracing::info!(
            qa_models = config.models.qa_catalog.len(),
            gen_models = config.models.gen_catalog.len(),
            chat_mode = %config.chat.mode,
            "ExamPrepService::with_loader() - Service initialization complete"
        );

        Ok(Self {
            extractor: DocumentExtractor::new(config.temp_root()),
            adapter: InferenceAdapter::new(config.generation.clone(), config.inference_timeout()),
            validator: InputValidator::new(config.upload.max_question_chars),
            provider,
            renderer,
            sessions,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn provider(&self) -> &Arc<ModelProvider> {
        &self.provider
    }

    pub fn render(&self, view: View, session: &Session, outcome: &ViewOutcome) -> Result<String> {
        self.renderer.render(
            view,
            session,
            outcome,
            self.provider.qa_catalog(),
            self.provider.gen_catalog(),
        )
    }

    /// Switch the session to `view`. Views that call models get their
    /// handles resolved up front so a load failure shows before any input.
    pub async fn open_view(&self, session: &mut Session, view: View) -> ViewOutcome {
        session.active_view = view;
        if !view.needs_models() {
            return ViewOutcome::default();
        }
        match self.handles(session).await {
            Ok(_) => ViewOutcome::default(),
            Err(e) => self.failed("open_view", &e),
        }
    }

    pub async fn update_settings(
        &self,
        session: &mut Session,
        qa_model: &str,
        gen_model: &str,
    ) -> ViewOutcome {
        session.active_view = View::Settings;
        let mut outcome = ViewOutcome::default();

        for (role, id) in [
            (ModelRole::QuestionAnswering, qa_model),
            (ModelRole::TextGeneration, gen_model),
        ] {
            if !self.provider.is_known(role, id) {
                outcome.push_error(&ExamPrepError::validation(
                    role.to_string(),
                    format!("'{id}' is not an available {role} model"),
                ));
            }
        }
        if !outcome.notices.is_empty() {
            return outcome;
        }

        // Handles for the new pair are resolved on the next model call.
        session.qa_model = qa_model.to_string();
        session.gen_model = gen_model.to_string();
        tracing::info!(
            session = %session.id,
            qa_model,
            gen_model,
            "Updated model selection"
        );
        outcome.notices.push(Notice::info("Settings saved."));
        outcome
    }

    pub async fn upload_document(
        &self,
        session: &mut Session,
        file: UploadedFile,
        question: Option<&str>,
    ) -> ViewOutcome {
        session.active_view = View::Upload;
        match self.try_upload_document(session, file, question).await {
            Ok(outcome) => outcome,
            Err(e) => self.failed("upload_document", &e),
        }
    }

    async fn try_upload_document(
        &self,
        session: &mut Session,
        file: UploadedFile,
        question: Option<&str>,
    ) -> Result<ViewOutcome> {
        self.validate_upload(&file)?;

        // A failed upload must not leave the previous paper answering questions.
        session.document = None;
        let extracted = self.extractor.extract(file.bytes).await?;
        let empty = extracted.is_empty();
        session.document = Some(UploadedDocument {
            file_name: file.file_name,
            extracted,
        });

        if empty {
            let mut outcome = ViewOutcome::default();
            outcome.notices.push(Notice::warning(NO_TEXT_WARNING));
            return Ok(outcome);
        }

        match question.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.try_ask_document(session, q).await,
            None => Ok(ViewOutcome::default()),
        }
    }

    fn validate_upload(&self, file: &UploadedFile) -> Result<()> {
        if file.bytes.is_empty() {
            return Err(ExamPrepError::validation("file", "Please choose a PDF file to upload."));
        }
        if file.bytes.len() > self.config.max_upload_bytes() {
            return Err(ExamPrepError::validation(
                "file",
                format!(
                    "File too large: {} bytes exceeds maximum of {}MB",
                    file.bytes.len(),
                    self.config.upload.max_upload_size_mb
                ),
            ));
        }
        let is_pdf_type = file
            .content_type
            .as_deref()
            .is_none_or(|ct| PDF_CONTENT_TYPES.contains(&ct));
        let is_pdf_name = file.file_name.to_lowercase().ends_with(".pdf");
        if !is_pdf_type || !is_pdf_name {
            return Err(ExamPrepError::validation(
                "file",
                "Only PDF question papers can be uploaded.",
            ));
        }
        Ok(())
    }

    pub async fn ask_document(&self, session: &mut Session, question: &str) -> ViewOutcome {
        session.active_view = View::Upload;
        match self.try_ask_document(session, question).await {
            Ok(outcome) => outcome,
            Err(e) => self.failed("ask_document", &e),
        }
    }

    async fn try_ask_document(&self, session: &Session, question: &str) -> Result<ViewOutcome> {
        let Some(document) = session.document.as_ref() else {
            return Err(ExamPrepError::validation(
                "file",
                "Upload a PDF question paper first.",
            ));
        };
        if document.extracted.is_empty() {
            let mut outcome = ViewOutcome::default();
            outcome.notices.push(Notice::warning(NO_TEXT_WARNING));
            return Ok(outcome);
        }
        let question = self.validator.validate_question("question", question)?;

        let handles = self.handles(session).await?;
        let answer = self
            .adapter
            .answer(handles.qa.as_ref(), question, &document.extracted.text)
            .await?;

        Ok(ViewOutcome {
            answer: Some(AnsweredQuestion::new(question, &answer)),
            ..Default::default()
        })
    }

    /// Explanation of an answer shown on the Upload view
    pub async fn explain_answer(
        &self,
        session: &mut Session,
        question: &str,
        answer: &str,
        confidence: Option<&str>,
    ) -> ViewOutcome {
        session.active_view = View::Upload;
        let shown = AnsweredQuestion {
            question: question.to_string(),
            answer: answer.to_string(),
            confidence: confidence.unwrap_or_default().to_string(),
        };
        match self.try_explain_answer(session, question, answer).await {
            Ok(explanation) => ViewOutcome {
                answer: Some(shown),
                explanation: Some(explanation),
                ..Default::default()
            },
            Err(e) => {
                let mut outcome = self.failed("explain_answer", &e);
                outcome.answer = Some(shown);
                outcome
            }
        }
    }

    async fn try_explain_answer(
        &self,
        session: &Session,
        question: &str,
        answer: &str,
    ) -> Result<String> {
        let question = self.validator.validate_question("question", question)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ExamPrepError::validation(
                "answer",
                "There is no answer to explain yet.",
            ));
        }
        let prompt = Prompt::explanation(question, answer, ExplanationStyle::Solve);
        self.explain(session, &prompt).await
    }

    pub async fn generate_practice(
        &self,
        session: &mut Session,
        subject: &str,
        topic: &str,
        num_questions: &str,
    ) -> ViewOutcome {
        session.active_view = View::Generate;
        match self
            .try_generate_practice(session, subject, topic, num_questions)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => self.failed("generate_practice", &e),
        }
    }

    async fn try_generate_practice(
        &self,
        session: &mut Session,
        subject: &str,
        topic: &str,
        num_questions: &str,
    ) -> Result<ViewOutcome> {
        let subject = self.validator.validate_subject(subject)?;
        let topic = self.validator.validate_topic(topic)?;
        let count = self.validator.parse_question_count(num_questions)?;

        let handles = self.handles(session).await?;
        let prompt = Prompt::practice(subject, topic, count);
        let text = self
            .adapter
            .generate(handles.generator.as_ref(), &prompt)
            .await?;

        session.practice = Some(PracticeSet {
            subject,
            topic: topic.to_string(),
            count,
            text,
        });
        Ok(ViewOutcome::default())
    }

    /// File name and body of the last generated practice set
    pub fn practice_download(&self, session: &Session) -> Option<(String, String)> {
        session
            .practice
            .as_ref()
            .map(|p| (p.subject.download_file_name(), p.text.clone()))
    }

    pub async fn send_chat(&self, session: &mut Session, message: &str) -> ViewOutcome {
        session.active_view = View::Chat;
        match self.try_send_chat(session, message).await {
            Ok(outcome) => outcome,
            Err(e) => self.failed("send_chat", &e),
        }
    }

    async fn try_send_chat(&self, session: &mut Session, message: &str) -> Result<ViewOutcome> {
        let message = self.validator.validate_question("message", message)?;
        let handles = self.handles(session).await?;

        let turn = match self.config.chat.mode {
            ChatMode::Extractive => {
                let answer = self
                    .adapter
                    .answer(handles.qa.as_ref(), message, &self.config.chat.context)
                    .await?;
                ChatTurn {
                    question: message.to_string(),
                    answer: answer.text,
                    score: Some(answer.score),
                }
            }
            ChatMode::Generative => {
                let text = self
                    .adapter
                    .generate(handles.generator.as_ref(), &Prompt::chat(message))
                    .await?;
                ChatTurn {
                    question: message.to_string(),
                    answer: text,
                    score: None,
                }
            }
        };

        session.push_turn(turn);
        tracing::info!(
            session = %session.id,
            turns = session.chat_history().len(),
            "Appended chat turn"
        );
        Ok(ViewOutcome::default())
    }

    pub async fn explain_turn(&self, session: &mut Session, index: usize) -> ViewOutcome {
        session.active_view = View::Chat;
        let Some(turn) = session.chat_history().get(index).cloned() else {
            return self.failed(
                "explain_turn",
                &ExamPrepError::validation("turn", format!("no chat turn number {index}")),
            );
        };
        let prompt = Prompt::explanation(&turn.question, &turn.answer, ExplanationStyle::Detail);
        match self.explain(session, &prompt).await {
            Ok(explanation) => ViewOutcome {
                explanation: Some(explanation),
                explained_turn: Some(index),
                ..Default::default()
            },
            Err(e) => self.failed("explain_turn", &e),
        }
    }

    async fn explain(&self, session: &Session, prompt: &Prompt) -> Result<String> {
        let handles = self.handles(session).await?;
        self.adapter
            .generate(handles.generator.as_ref(), prompt)
            .await
    }

    async fn handles(&self, session: &Session) -> Result<ModelHandles> {
        self.provider
            .get_handles(&session.qa_model, &session.gen_model)
            .await
    }

    fn failed(&self, operation: &str, err: &ExamPrepError) -> ViewOutcome {
        if err.is_warning() {
            tracing::warn!(operation, "rejected input: {}", err);
        } else {
            tracing::error!(operation, "operation failed: {}", err);
        }
        ViewOutcome::from_error(err)
    }
}
