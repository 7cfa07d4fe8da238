//! CLI `check` command — probe collaborators and print a health report.

use crate::config::FamulusConfig;
use crate::gateway::gemini::GeminiProvider;
use crate::gateway::ollama::OllamaProvider;
use crate::gateway::Gateway;
use crate::index::http::HttpVectorIndex;
use crate::index::VectorIndex;
use crate::memory::MemoryStore;
use anyhow::Result;
use std::sync::Arc;

/// Probe providers, the vector index, and the persistent documents.
pub async fn check(config: &FamulusConfig) -> Result<()> {
    println!("Famulus Health Report");
    println!("=====================");
    println!();

    let gateway = Gateway::new(vec![
        Arc::new(OllamaProvider::new(&config.providers.local)),
        Arc::new(GeminiProvider::new(&config.providers.cloud)),
    ]);
    println!("Providers:");
    for status in gateway.status().await {
        if status.models.is_empty() {
            println!("  {:<10} {}", status.id, status.state);
        } else {
            println!(
                "  {:<10} {} ({} models)",
                status.id,
                status.state,
                status.models.len()
            );
        }
    }
    println!();

    let index = HttpVectorIndex::new(
        &config.index.base_url,
        &config.index.collection,
        config.index.timeout_secs,
    )
    .map_err(|e| anyhow::anyhow!("failed to build index client: {e}"))?;
    match index.query("health probe", 1, None).await {
        Ok(_) => println!("Vector index:      online ({})", config.index.base_url),
        Err(e) => println!("Vector index:      offline ({e})"),
    }
    println!();

    let memory = MemoryStore::new(config.resolved_data_dir())?;
    let presence = memory.document_presence();
    println!("Documents in {}:", memory.data_dir().display());
    println!("  Memory profile:  {}", present(presence.profile));
    println!("  Decision log:    {}", present(presence.decisions));
    println!("  Project states:  {}", present(presence.projects));
    println!("  Scaffold state:  {}", present(presence.scaffold));

    Ok(())
}

fn present(exists: bool) -> &'static str {
    if exists {
        "present"
    } else {
        "missing"
    }
}
