//! Typed persistent-document definitions.
//!
//! Four independent JSON documents live on disk: [`MemoryProfile`] (durable
//! user/assistant facts), [`DecisionLog`] (past decisions with rationale),
//! [`ProjectStates`] (per-project phase/priority/blocker snapshots), and
//! [`ScaffoldState`] (the "current position / open loops / parked tangents"
//! orientation record). Every field is lenient-defaulting so documents
//! written by older versions still load; writers stamp `last_updated` before
//! persisting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Implemented by every persistent document so the store can stamp
/// `last_updated` on each write.
pub trait Stamped {
    fn stamp(&mut self, timestamp: String);
}

// ── Memory profile ────────────────────────────────────────────────────────────

/// Durable user/assistant facts: who the user is, what the assistant is,
/// the tracked domain's reference notes, and a rolling list of recent topics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryProfile {
    pub user_profile: UserProfile,
    pub self_awareness: Option<SelfAwareness>,
    pub domain_reference: Option<DomainReference>,
    pub conversation_context: ConversationContext,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub role: Option<String>,
}

/// What the assistant is and is not. Self-queries are answered from this
/// block directly, skipping retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfAwareness {
    pub identity: String,
    pub purpose: String,
    pub what_i_am: Option<String>,
    pub what_i_am_not: Option<String>,
    pub current_capability: Option<String>,
    pub target_capability: Option<String>,
}

/// Reference notes for the tracked subject-matter domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainReference {
    pub overview: String,
    pub key_facts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationContext {
    /// Newest first, capped by the store.
    pub recent_topics: Vec<RecentTopic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentTopic {
    pub timestamp: String,
    pub date: String,
    pub query: String,
    pub response_preview: String,
}

impl Stamped for MemoryProfile {
    fn stamp(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}

// ── Decision log ──────────────────────────────────────────────────────────────

/// Past decisions with their rationale and the alternatives that lost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionLog {
    pub decisions: Vec<Decision>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Decision {
    pub decision: String,
    pub date: String,
    pub rationale: String,
    pub alternatives_considered: Vec<Alternative>,
    pub impact: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alternative {
    pub option: String,
    pub rejected_because: String,
}

impl Stamped for DecisionLog {
    fn stamp(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}

// ── Project states ────────────────────────────────────────────────────────────

/// Map of project key (lowercase identifier) to its current snapshot.
/// BTreeMap keeps overview output in a stable order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectStates {
    pub projects: BTreeMap<String, ProjectState>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    pub full_name: String,
    pub current_phase: String,
    pub phase_description: Option<String>,
    pub last_worked: Option<String>,
    pub next_milestone: Option<Milestone>,
    pub current_priorities: Vec<String>,
    pub known_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    pub name: String,
    pub target_date: Option<String>,
    pub blockers: Vec<String>,
}

impl Stamped for ProjectStates {
    fn stamp(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}

// ── Scaffold state ────────────────────────────────────────────────────────────

/// Structural orientation: where the user is, what just finished, what is
/// still open, and which ideas were deliberately parked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldState {
    pub active_context: Option<ActiveContext>,
    /// Newest first, capped at 10 by writers.
    pub recent_completions: Vec<Completion>,
    pub open_loops: Vec<OpenLoop>,
    pub parked_tangents: Vec<ParkedTangent>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveContext {
    pub primary_project: String,
    pub structural_position: String,
    pub phase_goal: String,
    pub position_summary: Option<String>,
}

/// A finished piece of work, recorded with explicit permission-to-move-on
/// language so orientation answers can release the user from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Completion {
    pub what: String,
    pub when: String,
    pub criteria_met: Vec<String>,
    pub what_remains: Option<String>,
    pub permission: String,
    pub structural_significance: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenLoop {
    pub item: String,
    pub why_structural: Option<String>,
    pub status: String,
}

impl OpenLoop {
    pub fn is_open(&self) -> bool {
        self.status != "completed"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkedTangent {
    pub idea: String,
    pub why_parked: String,
    pub revisit_when: Option<String>,
}

impl Stamped for ScaffoldState {
    fn stamp(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}
