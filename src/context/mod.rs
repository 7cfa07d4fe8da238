//! Retrieval-augmented context assembly.
//!
//! Given a query, its classified intent, and a session handle, the assembler
//! fans out to the applicable sources in a fixed order — recent conversation,
//! self-awareness, domain reference, decision citations, project state,
//! structural orientation, knowledge-base retrieval — and concatenates their
//! truncated outputs into one labeled [`ContextBlock`] plus a parallel
//! [`Citation`] list.
//!
//! The single most important invariant here: a failed or empty source
//! contributes nothing and never aborts the assembly. Every source is
//! consulted behind its own absorb-and-continue boundary, so a user query
//! always yields some context block (possibly empty) no matter how degraded
//! the backing stores are.
//!
//! Ordering rules preserved exactly: a self-query skips retrieval entirely
//! (static profile data answers it; anything fetched would be noise); a pure
//! orientation query also skips retrieval (the scaffold already answered
//! it); per-source caps are independent and sources are never re-ranked
//! against each other.

pub mod retrieval;

use crate::config::{DomainConfig, FamulusConfig};
use crate::index::VectorIndex;
use crate::intent::Intent;
use crate::memory::types::{DecisionLog, ProjectStates, ScaffoldState};
use crate::memory::MemoryStore;
use crate::session::SessionStore;
use retrieval::RetrievalPolicy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// Per-excerpt cap in the knowledge-base section.
const EXCERPT_CHARS: usize = 1000;
/// Per-snippet cap for citations returned to the caller.
const CITATION_CHARS: usize = 500;
/// Cap on answers formatted into the recent-conversation section.
const ANSWER_PREVIEW_CHARS: usize = 500;
/// Decision citations kept, in log order.
const DECISION_CAP: usize = 3;
/// Open loops shown in the orientation section.
const OPEN_LOOP_CAP: usize = 3;
/// Excerpts formatted into the knowledge-base section.
const KNOWLEDGE_CAP: usize = 3;
/// Citations returned alongside the answer.
const CITATION_CAP: usize = 5;
/// Minimum word length for decision-log overlap matching.
const DECISION_WORD_LEN: usize = 3;
/// Minimum word length for parked-tangent overlap matching.
const TANGENT_WORD_LEN: usize = 4;

/// One labeled section, produced by exactly one source.
#[derive(Debug, Clone)]
pub struct Section {
    pub label: String,
    pub body: String,
}

/// The assembled, ordered, length-bounded context.
#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    sections: Vec<Section>,
}

impl ContextBlock {
    fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Concatenate all sections with labeled dividers, joined by blank lines.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("=== {} ===\n{}", s.label, s.body))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A retrieved excerpt surfaced to the caller as evidence, ordered by
/// retrieval rank.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub source: String,
    pub snippet: String,
}

/// The orchestrating reader over every context source. Side-effect-free:
/// reads only, deterministic given identical backing-store state.
pub struct ContextAssembler {
    memory: Arc<MemoryStore>,
    index: Arc<dyn VectorIndex>,
    sessions: Arc<SessionStore>,
    domain: DomainConfig,
    policy: RetrievalPolicy,
    recent_exchanges: usize,
}

impl ContextAssembler {
    pub fn new(
        memory: Arc<MemoryStore>,
        index: Arc<dyn VectorIndex>,
        sessions: Arc<SessionStore>,
        config: &FamulusConfig,
    ) -> Self {
        let policy = RetrievalPolicy {
            top_k: config.index.top_k,
            distance_threshold: config.index.distance_threshold,
            conversation_category: config.index.conversation_category.clone(),
            broad_categories: config.index.broad_categories.clone(),
            domain_category: config.domain.category.clone(),
        };
        Self {
            memory,
            index,
            sessions,
            domain: config.domain.clone(),
            policy,
            recent_exchanges: config.session.recent_exchanges,
        }
    }

    /// Build the context block and citation list for one request.
    pub async fn assemble(
        &self,
        query: &str,
        intent: &Intent,
        session_id: Option<&str>,
        retrieval_enabled: bool,
    ) -> (ContextBlock, Vec<Citation>) {
        let mut block = ContextBlock::default();

        // 1. Recent conversation
        if let Some(section) = self.recent_conversation_section(session_id) {
            block.push(section);
        }

        // 2. Self-awareness — also suppresses retrieval below
        if intent.is_self_query {
            if let Some(section) = self.self_awareness_section() {
                block.push(section);
            }
        }

        // 3. Domain reference
        if intent.is_domain_query {
            if let Some(section) = self.domain_section() {
                block.push(section);
            }
        }

        // 4. Decision citations
        if intent.is_why_question {
            if let Some(section) = self.decisions_section(query) {
                block.push(section);
            }
        }

        // 5. Project state
        if intent.is_next_action_query {
            if let Some(section) = self.project_section(query) {
                block.push(section);
            }
        }

        // 6. Structural orientation (+ tangent warning)
        if intent.needs_orientation || intent.is_next_action_query {
            let scaffold = self.memory.load_scaffold();
            if let Some(scaffold) = scaffold {
                if let Some(section) = orientation_section(&scaffold) {
                    block.push(section);
                }
                if let Some(section) = tangent_section(query, &scaffold) {
                    block.push(section);
                }
            }
        }

        // 7. Knowledge-base retrieval
        let mut citations = Vec::new();
        if retrieval_enabled && !intent.is_self_query {
            // A pure orientation query is already answered by the scaffold.
            let pure_orientation = intent.needs_orientation && !intent.is_domain_query;
            if pure_orientation {
                debug!("skipping retrieval for orientation query");
            } else {
                let matches = retrieval::smart_query(
                    self.index.as_ref(),
                    &self.policy,
                    query,
                    intent.is_domain_query,
                )
                .await;
                if !matches.is_empty() {
                    let mut body = String::new();
                    for (i, m) in matches.iter().take(KNOWLEDGE_CAP).enumerate() {
                        let _ = writeln!(body, "{}. {}", i + 1, truncate(&m.document, EXCERPT_CHARS));
                    }
                    block.push(Section {
                        label: "KNOWLEDGE BASE".into(),
                        body: body.trim_end().to_string(),
                    });
                    citations = matches
                        .iter()
                        .take(CITATION_CAP)
                        .map(|m| Citation {
                            source: m.category().unwrap_or("knowledge_base").to_string(),
                            snippet: truncate(&m.document, CITATION_CHARS),
                        })
                        .collect();
                }
            }
        }

        debug!(
            sections = block.sections.len(),
            citations = citations.len(),
            "context assembled"
        );
        (block, citations)
    }

    // ── Sources ───────────────────────────────────────────────────────────────

    /// Most recent exchanges from the session, answers truncated.
    fn recent_conversation_section(&self, session_id: Option<&str>) -> Option<Section> {
        let session = self.sessions.get(session_id?)?;
        if session.history.is_empty() {
            return None;
        }
        let start = session.history.len().saturating_sub(self.recent_exchanges);
        let mut body = String::new();
        for entry in &session.history[start..] {
            let _ = writeln!(body, "User: {}", entry.query);
            let _ = writeln!(
                body,
                "Assistant: {}",
                truncate(&entry.answer, ANSWER_PREVIEW_CHARS)
            );
            body.push('\n');
        }
        Some(Section {
            label: "RECENT CONVERSATION".into(),
            body: body.trim_end().to_string(),
        })
    }

    fn self_awareness_section(&self) -> Option<Section> {
        let profile = self.memory.load_profile()?;
        let sa = profile.self_awareness?;
        let mut body = String::new();
        let _ = writeln!(body, "Identity: {}", sa.identity);
        let _ = writeln!(body, "Purpose: {}", sa.purpose);
        if let Some(what) = &sa.what_i_am {
            let _ = writeln!(body, "What I am: {what}");
        }
        if let Some(not) = &sa.what_i_am_not {
            let _ = writeln!(body, "What I am NOT: {not}");
        }
        if let Some(current) = &sa.current_capability {
            let _ = writeln!(body, "Current capability: {current}");
        }
        if let Some(target) = &sa.target_capability {
            let _ = writeln!(body, "Target capability: {target}");
        }
        Some(Section {
            label: "SELF-AWARENESS".into(),
            body: body.trim_end().to_string(),
        })
    }

    fn domain_section(&self) -> Option<Section> {
        let profile = self.memory.load_profile()?;
        let reference = profile.domain_reference?;
        let mut body = reference.overview.trim_end().to_string();
        if !reference.key_facts.is_empty() {
            body.push('\n');
            for fact in &reference.key_facts {
                let _ = write!(body, "\n- {fact}");
            }
        }
        let label = if self.domain.name.is_empty() {
            "DOMAIN REFERENCE".to_string()
        } else {
            format!("{} REFERENCE", self.domain.name.to_uppercase())
        };
        Some(Section { label, body })
    }

    /// Decision-log scan: bag-of-words overlap between the query and each
    /// decision's text, first matches in log order, no further ranking.
    fn decisions_section(&self, query: &str) -> Option<Section> {
        let log = self.memory.load_decisions()?;
        decisions_section(query, &log)
    }

    /// Project snapshot: a project whose key literally appears in the query,
    /// or an overview of all projects when none does.
    fn project_section(&self, query: &str) -> Option<Section> {
        let states = self.memory.load_projects()?;
        project_section(query, &states)
    }
}

// ── Section builders over loaded documents ────────────────────────────────────

fn decisions_section(query: &str, log: &DecisionLog) -> Option<Section> {
    let query_words = significant_words(query, DECISION_WORD_LEN);
    if query_words.is_empty() {
        return None;
    }

    let relevant: Vec<_> = log
        .decisions
        .iter()
        .filter(|d| {
            let text = format!("{} {}", d.decision, d.rationale).to_lowercase();
            query_words.iter().any(|w| text.contains(w.as_str()))
        })
        .take(DECISION_CAP)
        .collect();

    if relevant.is_empty() {
        return None;
    }

    let mut body = String::new();
    for decision in relevant {
        let _ = writeln!(body, "Decision: {}", decision.decision);
        let _ = writeln!(body, "Date: {}", decision.date);
        let _ = writeln!(body, "Rationale: {}", decision.rationale);
        if !decision.alternatives_considered.is_empty() {
            let _ = writeln!(body, "Alternatives considered:");
            for alt in &decision.alternatives_considered {
                let _ = writeln!(
                    body,
                    "  - {}: rejected because {}",
                    alt.option, alt.rejected_because
                );
            }
        }
        if let Some(impact) = &decision.impact {
            let _ = writeln!(body, "Impact: {impact}");
        }
        let _ = writeln!(body, "---");
    }
    Some(Section {
        label: "RELEVANT DECISIONS".into(),
        body: body.trim_end().to_string(),
    })
}

fn project_section(query: &str, states: &ProjectStates) -> Option<Section> {
    if states.projects.is_empty() {
        return None;
    }
    let lowered = query.to_lowercase();
    let named = states
        .projects
        .iter()
        .find(|(key, _)| lowered.contains(key.as_str()));

    if let Some((_, project)) = named {
        let mut body = String::new();
        let _ = writeln!(body, "Project: {}", project.full_name);
        let _ = writeln!(body, "Current phase: {}", project.current_phase);
        if let Some(desc) = &project.phase_description {
            let _ = writeln!(body, "Phase description: {desc}");
        }
        if let Some(last) = &project.last_worked {
            let _ = writeln!(body, "Last worked: {last}");
        }
        if let Some(milestone) = &project.next_milestone {
            let _ = writeln!(body, "Next milestone: {}", milestone.name);
            if let Some(date) = &milestone.target_date {
                let _ = writeln!(body, "Target date: {date}");
            }
            if !milestone.blockers.is_empty() {
                let _ = writeln!(body, "Blockers:");
                for blocker in &milestone.blockers {
                    let _ = writeln!(body, "  - {blocker}");
                }
            }
        }
        if !project.current_priorities.is_empty() {
            let _ = writeln!(body, "Current priorities:");
            for priority in &project.current_priorities {
                let _ = writeln!(body, "  - {priority}");
            }
        }
        if !project.known_issues.is_empty() {
            let _ = writeln!(body, "Known issues:");
            for issue in &project.known_issues {
                let _ = writeln!(body, "  - {issue}");
            }
        }
        return Some(Section {
            label: "PROJECT STATE".into(),
            body: body.trim_end().to_string(),
        });
    }

    // No project named — overview of everything.
    let mut body = String::new();
    for (key, project) in &states.projects {
        let name = if project.full_name.is_empty() {
            key.as_str()
        } else {
            project.full_name.as_str()
        };
        let _ = writeln!(body, "{name}:");
        let _ = writeln!(body, "  Phase: {}", project.current_phase);
        if let Some(last) = &project.last_worked {
            let _ = writeln!(body, "  Last worked: {last}");
        }
        if let Some(top) = project.current_priorities.first() {
            let _ = writeln!(body, "  Top priority: {top}");
        }
    }
    Some(Section {
        label: "PROJECTS OVERVIEW".into(),
        body: body.trim_end().to_string(),
    })
}

/// Current position, latest completion (with its permission-to-move-on
/// language), and up to three open loops.
fn orientation_section(scaffold: &ScaffoldState) -> Option<Section> {
    let mut body = String::new();

    if let Some(active) = &scaffold.active_context {
        let _ = writeln!(body, "Project: {}", active.primary_project);
        let _ = writeln!(body, "Position: {}", active.structural_position);
        let _ = writeln!(body, "Goal: {}", active.phase_goal);
        if let Some(summary) = &active.position_summary {
            let _ = writeln!(body, "Summary: {summary}");
        }
    }

    if let Some(latest) = scaffold.recent_completions.first() {
        let _ = writeln!(body, "\nRecently completed: {}", latest.what);
        let _ = writeln!(body, "When: {}", latest.when);
        if let Some(significance) = &latest.structural_significance {
            let _ = writeln!(body, "Significance: {significance}");
        }
        let _ = writeln!(body, "Permission: {}", latest.permission);
    }

    let open: Vec<_> = scaffold
        .open_loops
        .iter()
        .filter(|l| l.is_open())
        .take(OPEN_LOOP_CAP)
        .collect();
    if !open.is_empty() {
        let _ = writeln!(body, "\nOpen loops:");
        for open_loop in open {
            let _ = writeln!(body, "- {} ({})", open_loop.item, open_loop.status);
            if let Some(why) = &open_loop.why_structural {
                let _ = writeln!(body, "  Why: {why}");
            }
        }
    }

    let body = body.trim().to_string();
    if body.is_empty() {
        return None;
    }
    Some(Section {
        label: "CURRENT POSITION".into(),
        body,
    })
}

/// Gentle warning when the query drifts toward a deliberately parked idea.
/// Overlap rule: any significant word (longer than four chars) of a parked
/// tangent's description appears in the query. First match wins.
fn tangent_section(query: &str, scaffold: &ScaffoldState) -> Option<Section> {
    let lowered = query.to_lowercase();
    let tangent = scaffold.parked_tangents.iter().find(|t| {
        significant_words(&t.idea, TANGENT_WORD_LEN)
            .iter()
            .any(|w| lowered.contains(w.as_str()))
    })?;

    let current_goal = scaffold
        .active_context
        .as_ref()
        .map(|a| a.phase_goal.as_str())
        .unwrap_or("not recorded");

    let mut body = String::new();
    let _ = writeln!(body, "You previously parked: \"{}\"", tangent.idea);
    let _ = writeln!(body, "Why parked: {}", tangent.why_parked);
    if let Some(revisit) = &tangent.revisit_when {
        let _ = writeln!(body, "Revisit when: {revisit}");
    }
    let _ = writeln!(body, "Current goal: {current_goal}");
    let _ = write!(
        body,
        "This is noted but not the current structural priority."
    );
    Some(Section {
        label: "PARKED TANGENT DETECTED".into(),
        body,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Lowercased words strictly longer than `min_len` characters.
fn significant_words(text: &str, min_len: usize) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > min_len)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.chars().count() > min_len)
        .collect()
}

/// Truncate to `max_chars` on a char boundary, appending "..." if truncated.
fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
