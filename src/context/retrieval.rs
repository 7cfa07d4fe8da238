//! Knowledge-base retrieval ladder.
//!
//! Category preference order: domain filter > conversation filter > broad
//! multi-category filter > unfiltered. Each rung is independently tolerant —
//! an error or an unconvincing result falls through to the next rung, and
//! total failure yields an empty result set, never an error.

use crate::index::{IndexMatch, MetadataFilter, VectorIndex};
use tracing::{debug, warn};

/// Keywords that mark a development/process query, where past conversation
/// chunks usually hold the answer.
const DEV_KEYWORDS: &[&str] = &[
    "discuss",
    "talk",
    "said",
    "conversation",
    "we",
    "our",
    "plan",
    "setup",
    "configure",
    "implement",
    "build",
    "create",
    "did we",
    "what was",
    "how did",
    "tell me about",
    "what did",
    "what were",
    "talked about",
];

/// Retrieval knobs, lifted from configuration at construction.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    pub top_k: usize,
    /// Ceiling on the best match's distance for the conversation rung to win.
    pub distance_threshold: f64,
    pub conversation_category: String,
    pub broad_categories: Vec<String>,
    pub domain_category: String,
}

/// Whether the query reads like a development/process question.
pub fn is_dev_query(query: &str) -> bool {
    let lowered = query.to_lowercase();
    DEV_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Walk the filter ladder and return the first convincing result set.
pub async fn smart_query(
    index: &dyn VectorIndex,
    policy: &RetrievalPolicy,
    query: &str,
    is_domain_query: bool,
) -> Vec<IndexMatch> {
    // Rung 1: domain-filtered, when the query names the tracked domain.
    if is_domain_query && !policy.domain_category.is_empty() {
        let filter = MetadataFilter::Eq("category".into(), policy.domain_category.clone());
        match index.query(query, policy.top_k, Some(&filter)).await {
            Ok(matches) if !matches.is_empty() => {
                debug!(count = matches.len(), "using domain-filtered results");
                return matches;
            }
            Ok(_) => debug!("domain filter matched nothing, widening"),
            Err(e) => warn!(error = %e, "domain-filtered query failed"),
        }
    }

    // Rung 2: conversation chunks, when this looks like a dev query and the
    // best match is close enough to trust.
    if is_dev_query(query) {
        let filter = MetadataFilter::Eq("category".into(), policy.conversation_category.clone());
        match index.query(query, policy.top_k, Some(&filter)).await {
            Ok(matches) => {
                let best = matches.first().map(|m| m.distance);
                match best {
                    Some(distance) if distance < policy.distance_threshold => {
                        debug!(best = distance, "using conversation-chunk results");
                        return matches;
                    }
                    _ => debug!(?best, "conversation chunks not good enough, widening"),
                }
            }
            Err(e) => warn!(error = %e, "conversation-chunk query failed"),
        }
    }

    // Rung 3: broad multi-category filter.
    if !policy.broad_categories.is_empty() {
        let filter = MetadataFilter::In("category".into(), policy.broad_categories.clone());
        match index.query(query, policy.top_k, Some(&filter)).await {
            Ok(matches) if !matches.is_empty() => {
                debug!(count = matches.len(), "using broad-category results");
                return matches;
            }
            Ok(_) => debug!("broad filter matched nothing, going unfiltered"),
            Err(e) => warn!(error = %e, "broad-category query failed"),
        }
    }

    // Rung 4: unfiltered. A failure here means no knowledge-base section.
    match index.query(query, policy.top_k, None).await {
        Ok(matches) => matches,
        Err(e) => {
            warn!(error = %e, "unfiltered query failed, retrieval contributes nothing");
            Vec::new()
        }
    }
}
