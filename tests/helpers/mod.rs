#![allow(dead_code)]

use async_trait::async_trait;
use famulus::chat::ChatService;
use famulus::config::FamulusConfig;
use famulus::context::ContextAssembler;
use famulus::error::{IndexError, ProviderError};
use famulus::gateway::{CompletionProvider, Gateway, ProviderStatus};
use famulus::index::{IndexMatch, KnowledgeChunk, MetadataFilter, VectorIndex};
use famulus::indexer;
use famulus::memory::types::{
    ActiveContext, Alternative, Decision, DecisionLog, MemoryProfile, ParkedTangent, ProjectState,
    ProjectStates, ScaffoldState, SelfAwareness,
};
use famulus::memory::MemoryStore;
use famulus::session::SessionStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

// ── Mock vector index ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub text: String,
    pub top_k: usize,
    /// Rendered `where` clause, or None for unfiltered.
    pub filter: Option<String>,
}

/// Scriptable index: per-category results for equality filters, one result
/// set for the broad filter, one for unfiltered queries. Counts every call.
#[derive(Default)]
pub struct MockIndex {
    pub by_category: Mutex<HashMap<String, Vec<IndexMatch>>>,
    pub broad: Mutex<Vec<IndexMatch>>,
    pub unfiltered: Mutex<Vec<IndexMatch>>,
    pub fail: AtomicBool,
    pub query_count: AtomicUsize,
    pub queries: Mutex<Vec<RecordedQuery>>,
    pub adds: Mutex<Vec<KnowledgeChunk>>,
    pub add_notify: Notify,
}

impl MockIndex {
    pub fn set_category(&self, category: &str, matches: Vec<IndexMatch>) {
        self.by_category
            .lock()
            .unwrap()
            .insert(category.to_string(), matches);
    }

    pub fn set_broad(&self, matches: Vec<IndexMatch>) {
        *self.broad.lock().unwrap() = matches;
    }

    pub fn set_unfiltered(&self, matches: Vec<IndexMatch>) {
        *self.unfiltered.lock().unwrap() = matches;
    }

    pub fn fail_queries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(RecordedQuery {
            text: text.to_string(),
            top_k,
            filter: filter.map(|f| f.to_where().to_string()),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("mock index down".into()));
        }
        let matches = match filter {
            Some(MetadataFilter::Eq(_, category)) => self
                .by_category
                .lock()
                .unwrap()
                .get(category)
                .cloned()
                .unwrap_or_default(),
            Some(MetadataFilter::In(_, _)) => self.broad.lock().unwrap().clone(),
            None => self.unfiltered.lock().unwrap().clone(),
        };
        Ok(matches)
    }

    async fn add(&self, chunk: KnowledgeChunk) -> Result<(), IndexError> {
        self.adds.lock().unwrap().push(chunk);
        self.add_notify.notify_waiters();
        Ok(())
    }
}

/// An index match with the given category tag.
pub fn doc(text: &str, category: &str, distance: f64) -> IndexMatch {
    IndexMatch {
        document: text.to_string(),
        metadata: serde_json::json!({ "category": category }),
        distance,
    }
}

// ── Mock providers ────────────────────────────────────────────────────────────

/// Scriptable provider: answers with a fixed reply or fails, and records
/// every prompt it saw.
pub struct MockProvider {
    id: &'static str,
    model: String,
    pub reply: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl MockProvider {
    pub fn answering(id: &'static str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            model: format!("{id}-default"),
            reply: Mutex::new(Some(reply.to_string())),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            model: format!("{id}-default"),
            reply: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_reply(&self, reply: Option<&str>) {
        *self.reply.lock().unwrap() = reply.map(|r| r.to_string());
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn handles(&self, model: &str) -> bool {
        model.contains(self.id)
    }

    async fn complete(&self, prompt: &str, _model: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.reply.lock().unwrap().clone() {
            Some(text) => Ok(text),
            None => Err(ProviderError::Unavailable {
                provider: self.id.to_string(),
                reason: "scripted failure".into(),
            }),
        }
    }

    async fn status(&self) -> ProviderStatus {
        ProviderStatus {
            id: self.id.to_string(),
            state: "online".into(),
            models: vec![],
        }
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

/// A fully wired chat service over mocks and a temp data dir.
pub struct Harness {
    pub tmp: TempDir,
    pub config: FamulusConfig,
    pub memory: Arc<MemoryStore>,
    pub sessions: Arc<SessionStore>,
    pub index: Arc<MockIndex>,
    pub local: Arc<MockProvider>,
    pub cloud: Arc<MockProvider>,
    pub chat: ChatService,
    pub worker: JoinHandle<()>,
}

/// Test config: temp data dir, a tracked "astris" domain, defaults elsewhere.
pub fn test_config(data_dir: &std::path::Path) -> FamulusConfig {
    let mut config = FamulusConfig::default();
    config.storage.data_dir = data_dir.to_string_lossy().into_owned();
    config.domain.name = "astris".into();
    config.domain.keywords = vec!["astris".into(), "resonance gap".into()];
    config.domain.category = "astris_master".into();
    config
}

/// Build the full harness. Must run inside a tokio runtime (the index worker
/// is spawned on it).
pub fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());

    let memory = Arc::new(MemoryStore::new(tmp.path()).unwrap());
    let sessions = Arc::new(SessionStore::new(&config.session));
    let index = Arc::new(MockIndex::default());
    let local = MockProvider::answering("local", "local answer");
    let cloud = MockProvider::answering("cloud", "cloud answer");

    let gateway = Arc::new(Gateway::new(vec![
        local.clone() as Arc<dyn CompletionProvider>,
        cloud.clone() as Arc<dyn CompletionProvider>,
    ]));

    let (indexer_handle, worker) =
        indexer::spawn(index.clone() as Arc<dyn VectorIndex>, config.indexer.queue_capacity);

    let assembler = ContextAssembler::new(
        memory.clone(),
        index.clone() as Arc<dyn VectorIndex>,
        sessions.clone(),
        &config,
    );
    let chat = ChatService::new(
        &config,
        assembler,
        gateway,
        sessions.clone(),
        memory.clone(),
        indexer_handle,
    )
    .unwrap();

    Harness {
        tmp,
        config,
        memory,
        sessions,
        index,
        local,
        cloud,
        chat,
        worker,
    }
}

/// An assembler alone, sharing the harness pattern without the chat layer.
pub fn assembler_over(
    memory: Arc<MemoryStore>,
    index: Arc<MockIndex>,
    sessions: Arc<SessionStore>,
    config: &FamulusConfig,
) -> ContextAssembler {
    ContextAssembler::new(memory, index as Arc<dyn VectorIndex>, sessions, config)
}

// ── Document seeds ────────────────────────────────────────────────────────────

pub fn seed_profile(memory: &MemoryStore) {
    let mut profile = MemoryProfile::default();
    profile.user_profile.name = "Jonathan".into();
    profile.self_awareness = Some(SelfAwareness {
        identity: "Assistant".into(),
        purpose: "help with X".into(),
        what_i_am: Some("a thought partner with persistent memory".into()),
        ..Default::default()
    });
    memory.save_profile(&mut profile).unwrap();
}

pub fn seed_decisions(memory: &MemoryStore) {
    let mut log = DecisionLog {
        decisions: vec![Decision {
            decision: "Use SQLite".into(),
            date: "2025-11-02".into(),
            rationale: "simplicity".into(),
            alternatives_considered: vec![Alternative {
                option: "Postgres".into(),
                rejected_because: "operational overhead".into(),
            }],
            impact: Some("single-file deploys".into()),
        }],
        last_updated: None,
    };
    memory.save_decisions(&mut log).unwrap();
}

pub fn seed_projects(memory: &MemoryStore) {
    let mut states = ProjectStates::default();
    states.projects.insert(
        "lumen".into(),
        ProjectState {
            full_name: "Lumen Synth".into(),
            current_phase: "phase 2".into(),
            current_priorities: vec!["finish the filter bank".into()],
            ..Default::default()
        },
    );
    memory.save_projects(&mut states).unwrap();
}

pub fn seed_scaffold(memory: &MemoryStore) {
    let mut scaffold = ScaffoldState {
        active_context: Some(ActiveContext {
            primary_project: "lumen".into(),
            structural_position: "phase 2 of 4".into(),
            phase_goal: "ship the filter bank".into(),
            position_summary: None,
        }),
        parked_tangents: vec![ParkedTangent {
            idea: "rewrite the preset browser".into(),
            why_parked: "not on the critical path".into(),
            revisit_when: None,
        }],
        ..Default::default()
    };
    memory.save_scaffold(&mut scaffold).unwrap();
}
