//! Language-model gateway.
//!
//! Abstracts the text-generation backends behind [`CompletionProvider`] and
//! drives the failover chain: providers are tried in order (the provider that
//! handles the requested model first), each failure falls through to the
//! next, and only full exhaustion surfaces to the caller — as a structured
//! [`FamulusError::AllProvidersExhausted`], never a panic. Once dispatched, a
//! provider call runs to completion or to its own timeout; there is no
//! mid-flight cancellation.

pub mod gemini;
pub mod ollama;

use crate::error::{FamulusError, ProviderError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Short timeout for health probes, independent of the generation timeout.
pub const STATUS_TIMEOUT_SECS: u64 = 2;

/// One text-generation backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stable identifier ("ollama", "gemini").
    fn id(&self) -> &'static str;

    /// Default model served by this backend.
    fn default_model(&self) -> &str;

    /// Whether this backend serves the given model id.
    fn handles(&self, model: &str) -> bool;

    /// Whether the backend has everything it needs to attempt a call
    /// (e.g. an API key). Unconfigured providers are skipped, not failed.
    fn configured(&self) -> bool {
        true
    }

    /// Generate a completion for the prompt. Bounded by the provider's own
    /// generation timeout.
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ProviderError>;

    /// Lightweight health probe (bounded by [`STATUS_TIMEOUT_SECS`]).
    async fn status(&self) -> ProviderStatus;
}

/// Health snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub state: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

/// A successful completion with its provenance.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub provider: String,
    pub model: String,
}

/// Ordered set of providers with failover.
pub struct Gateway {
    providers: Vec<Arc<dyn CompletionProvider>>,
}

impl Gateway {
    /// Providers in configured fallback order.
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        Self { providers }
    }

    /// Attempt order for a request: providers that handle the preferred
    /// model first, then the rest, preserving configured order within each
    /// group.
    fn ordered(&self, preference: Option<&str>) -> Vec<Arc<dyn CompletionProvider>> {
        let Some(pref) = preference else {
            return self.providers.clone();
        };
        let (mut preferred, rest): (Vec<_>, Vec<_>) = self
            .providers
            .iter()
            .cloned()
            .partition(|p| p.handles(pref));
        preferred.extend(rest);
        preferred
    }

    /// Run the failover chain. Unconfigured providers are skipped silently;
    /// each failure is logged and recorded; exhaustion returns the full
    /// attempt trail.
    pub async fn complete(
        &self,
        prompt: &str,
        preference: Option<&str>,
    ) -> Result<Completion, FamulusError> {
        let mut attempts = Vec::new();

        for provider in self.ordered(preference) {
            if !provider.configured() {
                continue;
            }
            let model = match preference {
                Some(pref) if provider.handles(pref) => pref.to_string(),
                _ => provider.default_model().to_string(),
            };
            match provider.complete(prompt, &model).await {
                Ok(text) => {
                    info!(provider = provider.id(), model = %model, "completion succeeded");
                    return Ok(Completion {
                        text,
                        provider: provider.id().to_string(),
                        model,
                    });
                }
                Err(e) => {
                    warn!(provider = provider.id(), error = %e, "provider failed, trying next");
                    attempts.push(format!("{}: {e}", provider.id()));
                }
            }
        }

        if attempts.is_empty() {
            attempts.push("no providers configured".to_string());
        }
        Err(FamulusError::AllProvidersExhausted { attempts })
    }

    /// Probe every provider, configured or not.
    pub async fn status(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            statuses.push(provider.status().await);
        }
        statuses
    }
}
