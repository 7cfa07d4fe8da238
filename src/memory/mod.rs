//! Persistent key-value JSON store.
//!
//! Whole-document semantics only: each document is read wholesale, mutated in
//! memory, and written back wholesale. No locking across processes —
//! single-writer usage is an accepted constraint, last write wins. A missing
//! or unreadable document reads as `None` so a degraded store never aborts a
//! request.

pub mod types;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use types::{DecisionLog, MemoryProfile, ProjectStates, RecentTopic, ScaffoldState, Stamped};

/// Maximum entries retained in the profile's recent-topics list.
const RECENT_TOPICS_CAP: usize = 50;

/// Characters of query/answer kept in a recent-topic entry.
const TOPIC_PREVIEW_CHARS: usize = 100;

const PROFILE_FILE: &str = "memory_profile.json";
const DECISIONS_FILE: &str = "decisions_log.json";
const PROJECTS_FILE: &str = "project_states.json";
const SCAFFOLD_FILE: &str = "scaffold_state.json";

/// File-backed store for the four persistent documents.
pub struct MemoryStore {
    data_dir: PathBuf,
}

impl MemoryStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    // ── Typed document accessors ──────────────────────────────────────────────

    pub fn load_profile(&self) -> Option<MemoryProfile> {
        self.read_doc(PROFILE_FILE)
    }

    pub fn save_profile(&self, profile: &mut MemoryProfile) -> Result<()> {
        self.write_doc(PROFILE_FILE, profile)
    }

    pub fn load_decisions(&self) -> Option<DecisionLog> {
        self.read_doc(DECISIONS_FILE)
    }

    pub fn save_decisions(&self, log: &mut DecisionLog) -> Result<()> {
        self.write_doc(DECISIONS_FILE, log)
    }

    pub fn load_projects(&self) -> Option<ProjectStates> {
        self.read_doc(PROJECTS_FILE)
    }

    pub fn save_projects(&self, states: &mut ProjectStates) -> Result<()> {
        self.write_doc(PROJECTS_FILE, states)
    }

    pub fn load_scaffold(&self) -> Option<ScaffoldState> {
        self.read_doc(SCAFFOLD_FILE)
    }

    pub fn save_scaffold(&self, scaffold: &mut ScaffoldState) -> Result<()> {
        self.write_doc(SCAFFOLD_FILE, scaffold)
    }

    /// Which documents are present on disk, for the status endpoint.
    pub fn document_presence(&self) -> DocumentPresence {
        DocumentPresence {
            profile: self.data_dir.join(PROFILE_FILE).exists(),
            decisions: self.data_dir.join(DECISIONS_FILE).exists(),
            projects: self.data_dir.join(PROJECTS_FILE).exists(),
            scaffold: self.data_dir.join(SCAFFOLD_FILE).exists(),
        }
    }

    // ── Side-channel writes ───────────────────────────────────────────────────

    /// Record a finished exchange in the profile's recent-topics list
    /// (read-modify-write; newest first, capped). Creates the profile
    /// document if it does not exist yet.
    pub fn record_topic(&self, query: &str, response_preview: &str) -> Result<()> {
        let mut profile = self.load_profile().unwrap_or_default();
        let now = chrono::Utc::now();
        let topic = RecentTopic {
            timestamp: now.to_rfc3339(),
            date: now.format("%Y-%m-%d").to_string(),
            query: truncate(query, TOPIC_PREVIEW_CHARS),
            response_preview: truncate(response_preview, TOPIC_PREVIEW_CHARS),
        };
        let topics = &mut profile.conversation_context.recent_topics;
        topics.insert(0, topic);
        topics.truncate(RECENT_TOPICS_CAP);
        self.save_profile(&mut profile)
    }

    // ── Whole-document I/O ────────────────────────────────────────────────────

    /// Read and deserialize a document. Missing file, unreadable file, and
    /// parse failure all read as `None` — the caller's source is simply
    /// unavailable, never an error.
    fn read_doc<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.data_dir.join(name);
        if !path.exists() {
            debug!(doc = name, "document not present");
            return None;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(doc = name, error = %e, "failed to read document");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(doc = name, error = %e, "failed to parse document");
                None
            }
        }
    }

    /// Stamp `last_updated` and write the document back wholesale.
    fn write_doc<T: Serialize + Stamped>(&self, name: &str, doc: &mut T) -> Result<()> {
        doc.stamp(chrono::Utc::now().to_rfc3339());
        let path = self.data_dir.join(name);
        let contents =
            serde_json::to_string_pretty(doc).with_context(|| format!("serialize {name}"))?;
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(doc = name, "document saved");
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// On-disk presence of each document, reported by `/api/status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentPresence {
    pub profile: bool,
    pub decisions: bool,
    pub projects: bool,
    pub scaffold: bool,
}

/// Truncate to `max_chars` on a char boundary.
fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
