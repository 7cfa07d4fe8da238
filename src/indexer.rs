//! Background auto-indexing of finished exchanges.
//!
//! One bounded queue, one worker task, FIFO. The chat path hands a finished
//! exchange to [`IndexerHandle::submit`] and returns immediately — the
//! caller-visible latency of a chat request never includes the index write,
//! and a write failure never surfaces to the caller. The queue is bounded so
//! a slow index cannot grow memory without limit; when it is full the
//! incoming job is dropped with a warning (the side channel is best-effort).
//! Indexed content becomes searchable eventually, not necessarily by the
//! next request.

use crate::index::{ChunkMetadata, KnowledgeChunk, VectorIndex};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Category tag carried by every auto-indexed exchange.
pub const LIVE_CONVERSATION_CATEGORY: &str = "live_conversation";

/// Characters of the query kept as a preview in chunk metadata.
const PREVIEW_CHARS: usize = 100;

/// One finished exchange awaiting indexing.
#[derive(Debug)]
pub struct IndexJob {
    pub query: String,
    pub answer: String,
    pub provider: String,
    pub model: String,
}

/// Producer side of the queue. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct IndexerHandle {
    tx: mpsc::Sender<IndexJob>,
}

impl IndexerHandle {
    /// Enqueue an exchange. Drops the job (with a warning) when the queue is
    /// full or the worker is gone.
    pub fn submit(&self, job: IndexJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("index queue full, dropping exchange");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("index worker stopped, dropping exchange");
            }
        }
    }
}

/// Start the worker. Returns the producer handle and the worker's join
/// handle; the worker exits when every handle clone is dropped.
pub fn spawn(index: Arc<dyn VectorIndex>, capacity: usize) -> (IndexerHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<IndexJob>(capacity);
    let worker = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let chunk = build_chunk(&job);
            let id = chunk.id.clone();
            match index.add(chunk).await {
                Ok(()) => debug!(chunk = %id, "indexed exchange"),
                Err(e) => warn!(chunk = %id, error = %e, "exchange indexing failed"),
            }
        }
        debug!("index worker drained and stopped");
    });
    (IndexerHandle { tx }, worker)
}

fn build_chunk(job: &IndexJob) -> KnowledgeChunk {
    let document = format!("User: {}\n\nAssistant: {}", job.query, job.answer);
    KnowledgeChunk {
        // UUID v7 is time-sortable, so chunk ids keep submission order
        id: format!("live-conv-{}", uuid::Uuid::now_v7()),
        document,
        metadata: ChunkMetadata {
            category: LIVE_CONVERSATION_CATEGORY.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            model: Some(job.model.clone()),
            provider: Some(job.provider.clone()),
            user_preview: Some(job.query.chars().take(PREVIEW_CHARS).collect()),
        },
    }
}
