//! Context-assembler behavior over scripted sources.

mod helpers;

use famulus::intent::Intent;
use famulus::memory::MemoryStore;
use famulus::session::SessionStore;
use helpers::{assembler_over, doc, seed_decisions, seed_profile, seed_projects, seed_scaffold, test_config, MockIndex};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

struct Setup {
    _tmp: TempDir,
    memory: Arc<MemoryStore>,
    sessions: Arc<SessionStore>,
    index: Arc<MockIndex>,
    assembler: famulus::context::ContextAssembler,
}

fn setup() -> Setup {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let memory = Arc::new(MemoryStore::new(tmp.path()).unwrap());
    let sessions = Arc::new(SessionStore::new(&config.session));
    let index = Arc::new(MockIndex::default());
    let assembler = assembler_over(memory.clone(), index.clone(), sessions.clone(), &config);
    Setup {
        _tmp: tmp,
        memory,
        sessions,
        index,
        assembler,
    }
}

fn intent(f: impl FnOnce(&mut Intent)) -> Intent {
    let mut intent = Intent::default();
    f(&mut intent);
    intent
}

#[tokio::test]
async fn self_query_never_touches_the_index() {
    let s = setup();
    seed_profile(&s.memory);
    s.index.set_unfiltered(vec![doc("MARKER retrieved text", "documentation", 0.2)]);

    let (block, citations) = s
        .assembler
        .assemble(
            "Who are you?",
            &intent(|i| i.is_self_query = true),
            None,
            true,
        )
        .await;

    assert_eq!(s.index.query_count.load(Ordering::SeqCst), 0);
    let rendered = block.render();
    assert!(rendered.contains("Assistant"));
    assert!(rendered.contains("help with X"));
    assert!(!rendered.contains("MARKER"));
    assert!(citations.is_empty());
}

#[tokio::test]
async fn index_failure_still_returns_a_block() {
    let s = setup();
    seed_decisions(&s.memory);
    s.index.fail_queries();

    let (block, citations) = s
        .assembler
        .assemble(
            "Why did we choose SQLite over Postgres?",
            &intent(|i| i.is_why_question = true),
            None,
            true,
        )
        .await;

    // Decisions section survives; the knowledge-base section is just absent
    let rendered = block.render();
    assert!(rendered.contains("Use SQLite"));
    assert!(!rendered.contains("KNOWLEDGE BASE"));
    assert!(citations.is_empty());
}

#[tokio::test]
async fn assembly_is_idempotent_for_fixed_state() {
    let s = setup();
    seed_profile(&s.memory);
    seed_decisions(&s.memory);
    seed_projects(&s.memory);
    seed_scaffold(&s.memory);
    s.index.set_unfiltered(vec![doc("stable excerpt", "documentation", 0.4)]);

    let i = intent(|i| {
        i.is_why_question = true;
        i.is_next_action_query = true;
    });
    let (first, _) = s
        .assembler
        .assemble("why did we choose sqlite, and what should I work on?", &i, None, true)
        .await;
    let (second, _) = s
        .assembler
        .assemble("why did we choose sqlite, and what should I work on?", &i, None, true)
        .await;

    assert_eq!(first.render(), second.render());
    assert!(!first.is_empty());
}

#[tokio::test]
async fn domain_filter_is_preferred() {
    let s = setup();
    s.index
        .set_category("astris_master", vec![doc("domain doc", "astris_master", 0.1)]);
    s.index.set_unfiltered(vec![doc("general doc", "documentation", 0.2)]);

    let (block, citations) = s
        .assembler
        .assemble(
            "Explain the astris decay formula",
            &intent(|i| i.is_domain_query = true),
            None,
            true,
        )
        .await;

    let queries = s.index.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].filter.as_deref().unwrap().contains("astris_master"));
    assert!(block.render().contains("domain doc"));
    assert_eq!(citations[0].source, "astris_master");
}

#[tokio::test]
async fn conversation_rung_wins_only_below_threshold() {
    let s = setup();
    // Close match: conversation chunks convince
    s.index.set_category(
        "conversation_chunk",
        vec![doc("we discussed the indexer", "conversation_chunk", 0.3)],
    );
    let (block, _) = s
        .assembler
        .assemble("what did we discuss about the indexer?", &Intent::default(), None, true)
        .await;
    assert!(block.render().contains("we discussed the indexer"));

    // Distant match: falls through to the broad rung
    let s = setup();
    s.index.set_category(
        "conversation_chunk",
        vec![doc("weak conversation match", "conversation_chunk", 0.9)],
    );
    s.index
        .set_broad(vec![doc("broad doc", "documentation", 0.5)]);
    let (block, _) = s
        .assembler
        .assemble("what did we discuss about the indexer?", &Intent::default(), None, true)
        .await;
    let rendered = block.render();
    assert!(rendered.contains("broad doc"));
    assert!(!rendered.contains("weak conversation match"));
}

#[tokio::test]
async fn unfiltered_is_the_last_resort() {
    let s = setup();
    s.index.set_unfiltered(vec![doc("last resort doc", "misc", 0.6)]);

    let (block, _) = s
        .assembler
        .assemble("tell me something about lighthouses", &Intent::default(), None, true)
        .await;

    assert!(block.render().contains("last resort doc"));
    let queries = s.index.queries();
    // Broad rung tried first (empty), then unfiltered
    let last = queries.last().unwrap();
    assert!(last.filter.is_none());
}

#[tokio::test]
async fn orientation_query_skips_retrieval() {
    let s = setup();
    seed_scaffold(&s.memory);
    s.index.set_unfiltered(vec![doc("noise", "documentation", 0.2)]);

    let (block, citations) = s
        .assembler
        .assemble(
            "Where was I?",
            &intent(|i| i.needs_orientation = true),
            None,
            true,
        )
        .await;

    assert_eq!(s.index.query_count.load(Ordering::SeqCst), 0);
    assert!(block.render().contains("ship the filter bank"));
    assert!(citations.is_empty());
}

#[tokio::test]
async fn retrieval_disabled_means_no_index_calls() {
    let s = setup();
    s.index.set_unfiltered(vec![doc("noise", "documentation", 0.2)]);

    let (_, citations) = s
        .assembler
        .assemble("anything at all", &Intent::default(), None, false)
        .await;

    assert_eq!(s.index.query_count.load(Ordering::SeqCst), 0);
    assert!(citations.is_empty());
}

#[tokio::test]
async fn excerpts_and_citations_are_capped_and_truncated() {
    let s = setup();
    let long = "x".repeat(1200);
    let docs: Vec<_> = (0..7)
        .map(|i| doc(&format!("{i}{long}"), "documentation", 0.1 + i as f64 / 100.0))
        .collect();
    s.index.set_unfiltered(docs);

    let (block, citations) = s
        .assembler
        .assemble("tell me something long", &Intent::default(), None, true)
        .await;

    let rendered = block.render();
    // Top 3 excerpts in the section, each capped at ~1000 chars
    assert!(rendered.contains("1. 0"));
    assert!(rendered.contains("3. 2"));
    assert!(!rendered.contains("4. 3"));

    // Top 5 citations, snippets capped at ~500 chars
    assert_eq!(citations.len(), 5);
    for citation in &citations {
        assert!(citation.snippet.chars().count() <= 503);
        assert!(citation.snippet.ends_with("..."));
    }
}

#[tokio::test]
async fn recent_conversation_carries_prior_exchanges() {
    let s = setup();
    let id = s.sessions.get_or_create(None);
    s.sessions
        .append(&id, "what is a lighthouse?", "a tower with a light", Intent::default());

    let (block, _) = s
        .assembler
        .assemble("and how tall are they?", &Intent::default(), Some(&id), false)
        .await;

    let rendered = block.render();
    assert!(rendered.contains("RECENT CONVERSATION"));
    assert!(rendered.contains("what is a lighthouse?"));
    assert!(rendered.contains("a tower with a light"));
}

#[tokio::test]
async fn unknown_session_contributes_nothing() {
    let s = setup();
    let (block, _) = s
        .assembler
        .assemble("hello", &Intent::default(), Some("ghost"), false)
        .await;
    assert!(block.is_empty());
}

#[tokio::test]
async fn tangent_warning_emitted_on_overlap() {
    let s = setup();
    seed_scaffold(&s.memory);

    let (block, _) = s
        .assembler
        .assemble(
            "should we rewrite the preset browser now?",
            &intent(|i| i.needs_orientation = true),
            None,
            true,
        )
        .await;

    let rendered = block.render();
    assert!(rendered.contains("PARKED TANGENT DETECTED"));
    assert!(rendered.contains("not on the critical path"));
}

#[tokio::test]
async fn empty_sources_yield_empty_block() {
    let s = setup();
    let i = intent(|i| {
        i.is_self_query = true;
        i.is_why_question = true;
        i.is_next_action_query = true;
        i.needs_orientation = true;
    });
    let (block, citations) = s.assembler.assemble("anything", &i, None, true).await;
    assert!(block.is_empty());
    assert_eq!(block.render(), "");
    assert!(citations.is_empty());
}
