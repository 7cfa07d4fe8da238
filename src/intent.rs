//! Query intent classification.
//!
//! Maps a free-text query to a small set of boolean flags that downstream
//! consumers check independently — there is no priority order among flags.
//! Classification is pure pattern matching over one declarative table, so
//! adding a category is a data change, and it never fails: an unmatched (or
//! empty) query simply produces all-false flags.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Flags derived from a query, plus the pattern that triggered each one
/// (first match per family only, for diagnostics).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Question about the assistant itself ("who are you").
    pub is_self_query: bool,
    /// Rationale question ("why did we choose X").
    pub is_why_question: bool,
    /// Next-step question ("what should I work on").
    pub is_next_action_query: bool,
    /// Mentions a keyword of the tracked subject-matter domain.
    pub is_domain_query: bool,
    /// Orientation question ("where was I", "catch me up").
    pub needs_orientation: bool,
    /// `"<family>: <pattern>"` entries, in family evaluation order.
    pub patterns_matched: Vec<String>,
}

/// One flag's ordered pattern list.
struct PatternFamily {
    label: &'static str,
    patterns: Vec<Pattern>,
}

struct Pattern {
    source: String,
    regex: Regex,
}

/// Compiled pattern table. Built once at startup from the persona name and
/// the configured domain keywords; everything else is built in.
pub struct IntentClassifier {
    self_family: PatternFamily,
    why_family: PatternFamily,
    next_family: PatternFamily,
    domain_family: PatternFamily,
    orientation_family: PatternFamily,
}

const WHY_PATTERNS: &[&str] = &[
    r"why did (we|you|i) (choose|use|pick|select|go with)",
    r"why.*instead of",
    r"why.*over",
    r"what was the reason",
    r"rationale for",
    r"why.*decision",
];

const NEXT_PATTERNS: &[&str] = &[
    r"what should (i|we) work on",
    r"what('s| is) next",
    r"what to do next",
    r"what should (i|we) focus on",
    r"what are (my|the) priorities",
    r"where should (i|we) start",
    r"what.*missing",
];

const SELF_PATTERNS: &[&str] = &[
    "what are you",
    "what is your",
    "tell me about yourself",
    "who are you",
    "what do you do",
];

const ORIENTATION_PATTERNS: &[&str] = &[
    "where was i",
    "where did i leave off",
    "what was i working on",
    "what was i doing",
    "where am i",
    "what's the status",
    "what's my progress",
    "catch me up",
    "bring me up to speed",
    "what have i done",
    "what's been done",
    "what's complete",
    "what's finished",
    "am i on track",
    "how's it going",
    "what should i work on",
    "what's next",
    "where should i start",
    "what's the priority",
];

impl IntentClassifier {
    /// Compile the pattern table. `persona_name` is matched as a whole word
    /// in the self family; `domain_keywords` are matched as literal
    /// substrings in the domain family.
    pub fn new(persona_name: &str, domain_keywords: &[String]) -> anyhow::Result<Self> {
        let mut self_patterns = Vec::new();
        let name = persona_name.trim().to_lowercase();
        if !name.is_empty() {
            self_patterns.push(format!(r"\b{}\b", regex::escape(&name)));
        }
        self_patterns.extend(SELF_PATTERNS.iter().map(|p| regex::escape(p)));

        Ok(Self {
            self_family: compile_family("self", &self_patterns)?,
            why_family: compile_family(
                "why",
                &WHY_PATTERNS.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            )?,
            next_family: compile_family(
                "next",
                &NEXT_PATTERNS.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            )?,
            domain_family: compile_family(
                "domain",
                &domain_keywords
                    .iter()
                    .map(|k| regex::escape(&k.to_lowercase()))
                    .collect::<Vec<_>>(),
            )?,
            orientation_family: compile_family(
                "orientation",
                &ORIENTATION_PATTERNS
                    .iter()
                    .map(|p| regex::escape(p))
                    .collect::<Vec<_>>(),
            )?,
        })
    }

    /// Classify a query. Pure and deterministic; never fails.
    pub fn classify(&self, query: &str) -> Intent {
        let mut intent = Intent::default();
        let lowered = query.trim().to_lowercase();
        if lowered.is_empty() {
            return intent;
        }

        intent.is_self_query = match_family(&self.self_family, &lowered, &mut intent.patterns_matched);
        intent.is_why_question =
            match_family(&self.why_family, &lowered, &mut intent.patterns_matched);
        intent.is_next_action_query =
            match_family(&self.next_family, &lowered, &mut intent.patterns_matched);
        intent.is_domain_query =
            match_family(&self.domain_family, &lowered, &mut intent.patterns_matched);
        intent.needs_orientation =
            match_family(&self.orientation_family, &lowered, &mut intent.patterns_matched);

        intent
    }
}

fn compile_family(label: &'static str, sources: &[String]) -> anyhow::Result<PatternFamily> {
    let patterns = sources
        .iter()
        .map(|src| {
            Regex::new(src)
                .map(|regex| Pattern {
                    source: src.clone(),
                    regex,
                })
                .map_err(|e| anyhow::anyhow!("bad {label} pattern {src:?}: {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(PatternFamily { label, patterns })
}

/// Evaluate patterns in order, short-circuiting on the first match.
fn match_family(family: &PatternFamily, lowered: &str, matched: &mut Vec<String>) -> bool {
    for pattern in &family.patterns {
        if pattern.regex.is_match(lowered) {
            matched.push(format!("{}: {}", family.label, pattern.source));
            return true;
        }
    }
    false
}
