//! Cloud model behind the Gemini generateContent API.
//!
//! The API key comes from the environment variable named in config and is
//! resolved once at construction. Without a key the provider reports itself
//! unconfigured and the gateway skips it.

use super::{CompletionProvider, ProviderStatus};
use crate::config::CloudProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiProvider {
    pub fn new(config: &CloudProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
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
impl CompletionProvider for GeminiProvider {
    fn id(&self) -> &'static str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn handles(&self, model: &str) -> bool {
        model.to_lowercase().contains("gemini")
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let Some(key) = &self.api_key else {
            return Err(ProviderError::Unavailable {
                provider: self.id().to_string(),
                reason: "api key not configured".into(),
            });
        };

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self
            .client
            .post(format!(
                "{}/models/{model}:generateContent?key={key}",
                self.base_url
            ))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable {
                provider: self.id().to_string(),
                reason: format!("generateContent returned status {}", response.status()),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| self.map_error(e))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::Unavailable {
                provider: self.id().to_string(),
                reason: "empty completion".into(),
            });
        }
        Ok(text)
    }

    /// No network probe — configuration presence is the health signal, and a
    /// real call would cost quota.
    async fn status(&self) -> ProviderStatus {
        ProviderStatus {
            id: self.id().to_string(),
            state: if self.configured() {
                "configured".into()
            } else {
                "not_configured".into()
            },
            models: if self.configured() {
                vec![self.model.clone()]
            } else {
                vec![]
            },
        }
    }
}
