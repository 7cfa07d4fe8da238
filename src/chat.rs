//! Chat orchestration.
//!
//! The single externally visible operation: classify the query, assemble
//! context, run the provider failover chain, then apply post-response side
//! effects — synchronous session append, best-effort recent-topics update,
//! and an asynchronous hand-off to the background indexer. Only provider
//! exhaustion surfaces to the caller; a failed exchange leaves no trace in
//! session history.

use crate::config::FamulusConfig;
use crate::context::{Citation, ContextAssembler};
use crate::error::FamulusError;
use crate::gateway::Gateway;
use crate::indexer::{IndexJob, IndexerHandle};
use crate::intent::IntentClassifier;
use crate::memory::MemoryStore;
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Built-in system persona, used when the config does not set one.
const DEFAULT_PERSONA: &str = "\
You are {name}, a personal AI assistant with persistent memory.

You are given context from several sources: recent conversation, durable \
notes about the user and yourself, documented decisions with their \
rationale, project states, structural orientation, and knowledge-base \
excerpts. When context is provided, use it naturally — answer as if you \
inherently know it, cite actual decisions and their rationale when they \
exist, and acknowledge project phases and open loops. Do not claim \
ignorance when the context already holds the answer, and do not cite \
sources awkwardly.";

/// An incoming chat request.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub use_retrieval: bool,
}

impl AskRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            model: None,
            use_retrieval: true,
        }
    }
}

/// A completed answer with its provenance.
#[derive(Debug, Clone)]
pub struct AnswerResult {
    pub text: String,
    pub citations: Vec<Citation>,
    pub provider: String,
    pub model: String,
    pub session_id: String,
    pub elapsed_seconds: f64,
}

/// Wires the classifier, assembler, gateway, session store, and indexer into
/// the ask-a-question-get-an-answer operation. Owned by the application
/// root and shared by reference — no ambient global state.
pub struct ChatService {
    classifier: IntentClassifier,
    assembler: ContextAssembler,
    gateway: Arc<Gateway>,
    sessions: Arc<SessionStore>,
    memory: Arc<MemoryStore>,
    indexer: IndexerHandle,
    persona: String,
}

impl ChatService {
    pub fn new(
        config: &FamulusConfig,
        assembler: ContextAssembler,
        gateway: Arc<Gateway>,
        sessions: Arc<SessionStore>,
        memory: Arc<MemoryStore>,
        indexer: IndexerHandle,
    ) -> anyhow::Result<Self> {
        let classifier = IntentClassifier::new(&config.persona.name, &config.domain.keywords)?;
        Ok(Self {
            classifier,
            assembler,
            gateway,
            sessions,
            memory,
            indexer,
            persona: persona_prompt(config),
        })
    }

    /// Answer one query. The only error that crosses this boundary is
    /// [`FamulusError::AllProvidersExhausted`].
    pub async fn answer(&self, request: AskRequest) -> Result<AnswerResult, FamulusError> {
        let start = Instant::now();

        let intent = self.classifier.classify(&request.message);
        info!(
            query = %preview(&request.message),
            self_query = intent.is_self_query,
            why = intent.is_why_question,
            next = intent.is_next_action_query,
            domain = intent.is_domain_query,
            orientation = intent.needs_orientation,
            "intent classified"
        );

        let session_id = self.sessions.get_or_create(request.session_id.as_deref());

        let (block, citations) = self
            .assembler
            .assemble(
                &request.message,
                &intent,
                Some(&session_id),
                request.use_retrieval,
            )
            .await;

        let prompt = build_prompt(&self.persona, &block.render(), &request.message);

        // No session append on failure — the exchange never happened.
        let completion = self
            .gateway
            .complete(&prompt, request.model.as_deref())
            .await?;

        self.sessions
            .append(&session_id, &request.message, &completion.text, intent);

        // Best-effort side channels: the answer already succeeded, so a
        // persistence failure is logged and swallowed.
        if let Err(e) = self
            .memory
            .record_topic(&request.message, &completion.text)
        {
            let e = FamulusError::Persist(e.to_string());
            warn!(error = %e, code = e.code(), "recent-topics update failed");
        }
        self.indexer.submit(IndexJob {
            query: request.message,
            answer: completion.text.clone(),
            provider: completion.provider.clone(),
            model: completion.model.clone(),
        });

        Ok(AnswerResult {
            text: completion.text,
            citations,
            provider: completion.provider,
            model: completion.model,
            session_id,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }
}

/// Resolve the system persona from config, falling back to the built-in.
pub fn persona_prompt(config: &FamulusConfig) -> String {
    if config.persona.system_prompt.trim().is_empty() {
        DEFAULT_PERSONA.replace("{name}", &config.persona.name)
    } else {
        config.persona.system_prompt.clone()
    }
}

/// Final prompt: persona, then the context block (when non-empty), then the
/// raw query.
fn build_prompt(persona: &str, context: &str, message: &str) -> String {
    if context.is_empty() {
        format!("{persona}\n\nUser: {message}")
    } else {
        format!("{persona}\n\n{context}\n\nUser: {message}")
    }
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
