pub mod adapter;
pub mod config;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod provider;
pub mod render;
pub mod service;
pub mod session;
pub mod transport;
pub mod validation;

pub use crate::config::Config;
pub use crate::error::{ExamPrepError, Result};
pub use crate::service::ExamPrepService;
