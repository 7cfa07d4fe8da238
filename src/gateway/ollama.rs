//! Locally hosted model behind an Ollama-style HTTP API.

use super::{CompletionProvider, ProviderStatus, STATUS_TIMEOUT_SECS};
use crate::config::LocalProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaProvider {
    pub fn new(config: &LocalProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    fn map_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                provider: self.id().to_string(),
                seconds: self.timeout_secs,
            }
        } else {
            ProviderError::Unavailable {
                provider: self.id().to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn id(&self) -> &'static str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    /// Serves every model id that is not a cloud model.
    fn handles(&self, model: &str) -> bool {
        !model.to_lowercase().contains("gemini")
    }

    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable {
                provider: self.id().to_string(),
                reason: format!("generate returned status {}", response.status()),
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| self.map_error(e))?;
        if parsed.response.is_empty() {
            return Err(ProviderError::Unavailable {
                provider: self.id().to_string(),
                reason: "empty completion".into(),
            });
        }
        if let Some(served) = parsed.model {
            tracing::debug!(model = %served, "ollama served completion");
        }
        Ok(parsed.response)
    }

    async fn status(&self) -> ProviderStatus {
        let result = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(STATUS_TIMEOUT_SECS))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                let models = response
                    .json::<TagsResponse>()
                    .await
                    .map(|tags| tags.models.into_iter().map(|m| m.name).collect())
                    .unwrap_or_default();
                ProviderStatus {
                    id: self.id().to_string(),
                    state: "online".into(),
                    models,
                }
            }
            _ => ProviderStatus {
                id: self.id().to_string(),
                state: "offline".into(),
                models: vec![],
            },
        }
    }
}
