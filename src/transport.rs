use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{ExamPrepError, Result};

/// Outbound contract of the hosted inference API.
///
/// Requests are sent once. Failures surface to the user, who decides whether
/// to retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON payload to the model endpoint and return the decoded body.
    async fn invoke(&self, model_id: &str, payload: &Value) -> Result<Value>;

    /// Check that the model endpoint exists and is reachable.
    async fn probe(&self, model_id: &str) -> Result<()>;
}

pub struct HubTransport {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HubTransport {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn model_url(&self, model_id: &str) -> String {
        format!("{}/models/{}", self.base_url, model_id)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }
}

#[async_trait]
impl Transport for HubTransport {
    async fn invoke(&self, model_id: &str, payload: &Value) -> Result<Value> {
        let url = self.model_url(model_id);
        tracing::debug!(%url, "invoking model");

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                ExamPrepError::Inference(format!("Failed to reach model '{model_id}': {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExamPrepError::Inference(format!(
                "Model '{model_id}' returned {status}: {body}"
            )));
        }

        response.json().await.map_err(|e| {
            ExamPrepError::Inference(format!(
                "Failed to parse response from model '{model_id}': {e}"
            ))
        })
    }

    async fn probe(&self, model_id: &str) -> Result<()> {
        let url = self.model_url(model_id);
        let response = self.authorize(self.client.get(&url)).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ExamPrepError::Internal(format!(
                "model endpoint {url} answered {status}"
            )))
        }
    }
}
