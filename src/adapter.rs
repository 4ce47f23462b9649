use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{ExamPrepError, Result};
use crate::models::{GenerationRequest, QaRequest};
use crate::prompts::Prompt;
use crate::provider::{QuestionAnswerer, TextGenerator};

/// Unwrapped QA result
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Model confidence in [0.0, 1.0]; shown, never used as a gate
    pub score: f64,
}

/// Turns questions and prompts into model calls and model output into text
#[derive(Debug, Clone)]
pub struct InferenceAdapter {
    generation: GenerationConfig,
    timeout: Duration,
}

impl InferenceAdapter {
    pub fn new(generation: GenerationConfig, timeout: Duration) -> Self {
        Self {
            generation,
            timeout,
        }
    }

    pub async fn answer(
        &self,
        qa: &dyn QuestionAnswerer,
        question: &str,
        context: &str,
    ) -> Result<Answer> {
        let req = QaRequest::new(question, context);
        tracing::info!(
            model = qa.model_id(),
            context_chars = context.len(),
            "Answering question"
        );

        let response = self.bounded(qa.answer(&req)).await?;
        let best = response.into_best().ok_or_else(|| {
            ExamPrepError::Inference(format!("Model '{}' returned no answer", qa.model_id()))
        })?;

        Ok(Answer {
            text: best.answer,
            score: clamp_score(best.score),
        })
    }

    pub async fn generate(&self, generator: &dyn TextGenerator, prompt: &Prompt) -> Result<String> {
        let rendered = truncate_chars(&prompt.render(), self.generation.max_prompt_chars);
        let req = GenerationRequest::new(rendered.clone(), prompt.max_new_tokens(&self.generation));
        tracing::info!(
            model = generator.model_id(),
            kind = prompt.kind(),
            max_new_tokens = req.parameters.max_new_tokens,
            "Generating text"
        );

        let sequences = self.bounded(generator.generate(&req)).await?;
        let first = sequences.into_iter().next().ok_or_else(|| {
            ExamPrepError::Inference(format!(
                "Model '{}' returned no sequences",
                generator.model_id()
            ))
        })?;

        let text = strip_echo(&first.generated_text, &rendered);
        if text.is_empty() {
            return Err(ExamPrepError::Inference(format!(
                "Model '{}' returned an empty continuation",
                generator.model_id()
            )));
        }
        Ok(text)
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ ExamPrepError::Inference(_))) => Err(e),
            Ok(Err(e)) => Err(ExamPrepError::Inference(e.to_string())),
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Model call timed out");
                Err(ExamPrepError::InferenceTimeout(self.timeout))
            }
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Some models echo the prompt before the continuation.
fn strip_echo(output: &str, prompt: &str) -> String {
    output
        .strip_prefix(prompt)
        .unwrap_or(output)
        .trim()
        .to_string()
}
