#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod chunking;
pub mod embedding;
pub mod extraction;
pub mod persistence;
pub mod pipeline;
pub mod prompts;
pub mod resolver;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::model::{Document, IngestionTask, IngestionTaskStatus, TaskErrorInfo};
use common::ports::IngestionTaskQueue;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

pub use pipeline::{IngestOutcome, Orchestrator, PipelineConfig};

/// Polls `task_queue` for ready `IngestionTask`s and drives each one through
/// `orchestrator.ingest`, per the ambient worker-loop entry point (§4.7).
///
/// This loop carries no knowledge-graph semantics of its own: it claims a
/// task with a lease (so a crashed worker's claim eventually expires and
/// becomes reclaimable), delegates to the Orchestrator, and records the
/// outcome back on the task, dead-lettering it once `max_attempts` is
/// exhausted. Runs until cancelled by the caller.
pub async fn run_worker_loop(
    task_queue: Arc<dyn IngestionTaskQueue>,
    orchestrator: Arc<Orchestrator>,
    worker: pipeline::config::WorkerTuning,
) -> ! {
    let worker_id = format!("ingestion-worker-{}", Uuid::new_v4());
    let lease = Duration::from_secs(worker.lease_secs);
    let idle_backoff = Duration::from_millis(worker.idle_backoff_ms);
    let error_backoff = Duration::from_millis(worker.error_backoff_ms);

    loop {
        match task_queue.claim_next_ready(&worker_id, Utc::now(), lease).await {
            Ok(Some(task)) => {
                handle_task(task_queue.as_ref(), orchestrator.as_ref(), task, &worker_id).await;
            }
            Ok(None) => {
                sleep(idle_backoff).await;
            }
            Err(err) => {
                error!(%worker_id, error = %err, "failed to claim ingestion task");
                sleep(error_backoff).await;
            }
        }
    }
}

async fn handle_task(
    task_queue: &dyn IngestionTaskQueue,
    orchestrator: &Orchestrator,
    task: IngestionTask,
    worker_id: &str,
) {
    let task_id = task.id;
    info!(%worker_id, %task_id, attempt = task.attempts, "claimed ingestion task");

    let document = task_to_document(&task);
    match orchestrator.ingest(&document).await {
        Ok(outcome) => {
            info!(
                %worker_id,
                %task_id,
                chunks = outcome.chunk_count,
                entities = outcome.entity_count,
                relations = outcome.relation_count,
                "ingestion task succeeded"
            );
            if let Err(err) = task_queue.update_status(task_id, IngestionTaskStatus::Succeeded).await {
                warn!(%worker_id, %task_id, error = %err, "failed to record task success");
            }
        }
        Err(err) => {
            let info = TaskErrorInfo {
                code: None,
                message: err.to_string(),
            };
            let status = if task.can_retry() {
                warn!(%worker_id, %task_id, error = %err, "ingestion task failed, will retry");
                IngestionTaskStatus::Failed(info)
            } else {
                error!(%worker_id, %task_id, error = %err, "ingestion task exhausted retries, dead-lettering");
                IngestionTaskStatus::DeadLetter(info)
            };
            if let Err(write_err) = task_queue.update_status(task_id, status).await {
                warn!(%worker_id, %task_id, error = %write_err, "failed to record task failure");
            }
        }
    }
}

fn task_to_document(task: &IngestionTask) -> Document {
    let mut metadata: HashMap<String, String> = task.metadata.clone();
    metadata.insert("project_id".to_string(), task.project_id.clone());
    Document {
        id: task.doc_id.clone(),
        content: task.content.clone(),
        metadata,
    }
}
