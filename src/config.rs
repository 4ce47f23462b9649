use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::{Display, EnumString};

use crate::models::ModelOption;

/// Main configuration structure for the exam prep service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
    pub generation: GenerationConfig,
    pub upload: UploadConfig,
    pub chat: ChatConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the hosted inference API (models live under `/models/{id}`)
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
    /// Probe `GET /models/{id}` before handing out a handle
    pub verify_on_load: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub qa_catalog: Vec<ModelOption>,
    pub gen_catalog: Vec<ModelOption>,
    #[serde(default)]
    pub default_qa: Option<String>,
    #[serde(default)]
    pub default_gen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub explanation_max_tokens: u32,
    pub practice_max_tokens: u32,
    pub chat_max_tokens: u32,
    /// Prompts longer than this are cut before they are sent
    pub max_prompt_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_upload_size_mb: usize,
    #[serde(default)]
    pub temp_root: Option<PathBuf>,
    pub max_question_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatMode {
    /// Answer with the QA model against the built-in syllabus context
    Extractive,
    /// Answer with the generation model from a fixed tutor preamble
    Generative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub mode: ChatMode,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub idle_ttl_seconds: u64,
    pub purge_interval_seconds: u64,
}

/// Largest upload limit accepted from config or environment
pub const MAX_UPLOAD_SIZE_MB: usize = 1024;

pub const DEFAULT_CHAT_CONTEXT: &str = "RRB NTPC exam preparation context: Covers Mathematics (LCM, Percentages, etc.), \
General Intelligence & Reasoning (Coding-Decoding, Puzzles), \
General Awareness (Indian Railways, Current Affairs, History, Geography). Provide accurate answers.";

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded .env from: {}", path.display()),
            Err(_) => tracing::debug!("No .env file found - continuing with env vars only"),
        }

        let config_path =
            env::var("EXAM_PREP_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = Self::from_file(Path::new(&config_path));
        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!("Config file not found at {} - using defaults", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = env::var("EXAM_PREP_BIND") {
            self.server.bind = bind;
        }

        if let Ok(url) = env::var("EXAM_PREP_INFERENCE_URL") {
            self.inference.base_url = url;
        }
        if let Ok(token) = env::var("HF_API_TOKEN") {
            if !token.is_empty() {
                self.inference.api_token = Some(token);
            }
        }
        if let Ok(timeout) = env::var("EXAM_PREP_INFERENCE_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.inference.timeout_seconds = secs;
            }
        }

        if let Ok(id) = env::var("EXAM_PREP_DEFAULT_QA_MODEL") {
            self.models.default_qa = Some(id);
        }
        if let Ok(id) = env::var("EXAM_PREP_DEFAULT_GEN_MODEL") {
            self.models.default_gen = Some(id);
        }

        if let Ok(size) = env::var("EXAM_PREP_MAX_UPLOAD_MB") {
            if let Ok(mb) = size.parse::<usize>() {
                if mb > MAX_UPLOAD_SIZE_MB {
                    tracing::warn!(
                        "EXAM_PREP_MAX_UPLOAD_MB={} exceeds {} - clamping",
                        mb,
                        MAX_UPLOAD_SIZE_MB
                    );
                }
                self.upload.max_upload_size_mb = mb.min(MAX_UPLOAD_SIZE_MB);
            }
        }

        if let Ok(mode) = env::var("EXAM_PREP_CHAT_MODE") {
            match mode.parse() {
                Ok(mode) => self.chat.mode = mode,
                Err(_) => tracing::warn!("Unknown chat mode '{}', keeping {}", mode, self.chat.mode),
            }
        }

        if let Ok(ttl) = env::var("EXAM_PREP_SESSION_TTL_SECONDS") {
            if let Ok(secs) = ttl.parse() {
                self.session.idle_ttl_seconds = secs;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.models.qa_catalog.is_empty() {
            return Err("models.qa_catalog cannot be empty".into());
        }
        if self.models.gen_catalog.is_empty() {
            return Err("models.gen_catalog cannot be empty".into());
        }
        if let Some(id) = &self.models.default_qa {
            if !self.models.qa_catalog.iter().any(|m| &m.id == id) {
                return Err(format!("default QA model '{id}' is not in models.qa_catalog").into());
            }
        }
        if let Some(id) = &self.models.default_gen {
            if !self.models.gen_catalog.iter().any(|m| &m.id == id) {
                return Err(
                    format!("default generation model '{id}' is not in models.gen_catalog").into(),
                );
            }
        }
        if self.inference.timeout_seconds == 0 {
            return Err("inference.timeout_seconds cannot be 0".into());
        }
        if self.upload.max_upload_size_mb == 0 {
            return Err("upload.max_upload_size_mb cannot be 0".into());
        }
        if self.upload.max_upload_size_mb > MAX_UPLOAD_SIZE_MB {
            return Err(format!(
                "upload.max_upload_size_mb cannot exceed {MAX_UPLOAD_SIZE_MB}"
            )
            .into());
        }
        if self.generation.max_prompt_chars == 0 {
            return Err("generation.max_prompt_chars cannot be 0".into());
        }
        if self.inference.api_token.is_none() {
            return Err("HF_API_TOKEN is not set; anonymous inference may be rate limited".into());
        }
        Ok(())
    }

    /// QA model a fresh session starts with
    pub fn default_qa_model(&self) -> String {
        self.models
            .default_qa
            .clone()
            .or_else(|| self.models.qa_catalog.first().map(|m| m.id.clone()))
            .unwrap_or_default()
    }

    /// Generation model a fresh session starts with
    pub fn default_gen_model(&self) -> String {
        self.models
            .default_gen
            .clone()
            .or_else(|| self.models.gen_catalog.first().map(|m| m.id.clone()))
            .unwrap_or_default()
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.timeout_seconds)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.upload.max_upload_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session.idle_ttl_seconds)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.upload.temp_root.clone().unwrap_or_else(env::temp_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "exam-prep-ai".to_string(),
                bind: "127.0.0.1:8501".to_string(),
            },
            inference: InferenceConfig {
                base_url: "https://api-inference.huggingface.co".to_string(),
                api_token: None,
                timeout_seconds: 120,
                verify_on_load: true,
            },
            models: ModelsConfig {
                qa_catalog: vec![
                    ModelOption::new(
                        "DistilBERT (distilbert-base-uncased-distilled-squad)",
                        "distilbert-base-uncased-distilled-squad",
                    ),
                    ModelOption::new(
                        "RoBERTa (deepset/roberta-base-squad2)",
                        "deepset/roberta-base-squad2",
                    ),
                    ModelOption::new(
                        "BERT Large (bert-large-uncased-whole-word-masking-finetuned-squad)",
                        "bert-large-uncased-whole-word-masking-finetuned-squad",
                    ),
                ],
                gen_catalog: vec![
                    ModelOption::new("GPT-2 (gpt2)", "gpt2"),
                    ModelOption::new(
                        "Falcon 7B Instruct (tiiuae/falcon-7b-instruct)",
                        "tiiuae/falcon-7b-instruct",
                    ),
                    ModelOption::new("FLAN-T5 Base (google/flan-t5-base)", "google/flan-t5-base"),
                ],
                default_qa: None,
                default_gen: None,
            },
            generation: GenerationConfig {
                explanation_max_tokens: 150,
                practice_max_tokens: 500,
                chat_max_tokens: 150,
                max_prompt_chars: 2000,
            },
            upload: UploadConfig {
                max_upload_size_mb: 20,
                temp_root: None,
                max_question_chars: 500,
            },
            chat: ChatConfig {
                mode: ChatMode::Extractive,
                context: DEFAULT_CHAT_CONTEXT.to_string(),
            },
            session: SessionConfig {
                idle_ttl_seconds: 3600,
                purge_interval_seconds: 300,
            },
        }
    }
}
