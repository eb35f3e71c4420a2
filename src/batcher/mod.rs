//! The embedding batcher: coalesces concurrent embed requests into
//! provider-sized batches.
//!
//! Submitters probe the cache, enqueue a [`WorkItem`] on miss, and await a
//! one-shot waiter. A single [`DispatchLoop`] drains the queue into batches
//! bounded by size and a wait window, runs one provider call per batch, and
//! fans results back per item in original order. See [`dispatch`] for the
//! loop and fan-out.
//!
//! # Ownership
//!
//! A work item is owned by its submitter until enqueued, by the loop from
//! enqueue to completion, and is destroyed after its waiter is signalled
//! exactly once. Waiter cancellation (submitter timeout) is just receiver
//! drop; fan-out discards orphaned results silently.

pub mod dispatch;

pub use dispatch::DispatchLoop;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::adapters::ModelAdapter;
use crate::cache::VectorCache;
use crate::error::{Result, TensorError};
use crate::fingerprint::fingerprint;

/// Batcher tuning parameters.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Maximum work items per dispatched batch.
    pub max_batch: usize,
    /// How long a batch stays open waiting for more items.
    pub max_batch_wait: Duration,
    /// Submitter deadline from enqueue to fan-out.
    pub submit_timeout: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch: 64,
            max_batch_wait: Duration::from_millis(25),
            submit_timeout: Duration::from_secs(30),
        }
    }
}

/// One embed request's results, positionally aligned with its inputs.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub adapter_name: String,
    pub adapter_version: String,
    pub vectors: Vec<Vec<f32>>,
    pub cached: Vec<bool>,
}

/// The queued unit: one job's inputs bound to one adapter and one waiter.
pub(crate) struct WorkItem {
    pub(crate) job_id: Uuid,
    pub(crate) adapter: Arc<dyn ModelAdapter>,
    pub(crate) inputs: Vec<String>,
    pub(crate) waiter: oneshot::Sender<Result<EmbedOutcome>>,
}

/// Submit handle for the batcher.
///
/// Cheap to clone; every clone feeds the same queue and dispatch loop.
#[derive(Clone)]
pub struct EmbedBatcher {
    tx: mpsc::UnboundedSender<WorkItem>,
    cache: VectorCache,
    submit_timeout: Duration,
}

impl EmbedBatcher {
    /// Create a submit handle and the dispatch loop that serves it.
    ///
    /// The loop is returned unstarted; the composition root spawns
    /// [`DispatchLoop::run`] exactly once.
    pub fn new(cache: VectorCache, config: BatcherConfig) -> (Self, DispatchLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        let batcher = Self {
            tx,
            cache: cache.clone(),
            submit_timeout: config.submit_timeout,
        };
        (batcher, DispatchLoop::new(rx, cache, config))
    }

    /// Run one embed request through the batching system.
    ///
    /// Fast path: when every input is already cached, results are returned
    /// immediately and nothing is enqueued. Otherwise all inputs are queued
    /// as one work item — the loop re-probes the cache at dispatch time, so
    /// hits that land between now and then are still honoured — and the
    /// caller waits for fan-out under the configured deadline.
    pub async fn submit(
        &self,
        adapter: Arc<dyn ModelAdapter>,
        inputs: Vec<String>,
    ) -> Result<EmbedOutcome> {
        let keys: Vec<String> = inputs
            .iter()
            .map(|text| fingerprint(adapter.name(), adapter.version(), text))
            .collect();

        let probe = self.cache.multi_get(&keys).await;
        if probe.iter().all(Option::is_some) {
            let count = probe.len();
            return Ok(EmbedOutcome {
                adapter_name: adapter.name().to_string(),
                adapter_version: adapter.version().to_string(),
                vectors: probe.into_iter().flatten().collect(),
                cached: vec![true; count],
            });
        }

        let (waiter, receipt) = oneshot::channel();
        let item = WorkItem {
            job_id: Uuid::new_v4(),
            adapter,
            inputs,
            waiter,
        };
        self.tx.send(item).map_err(|_| TensorError::Shutdown)?;

        match tokio::time::timeout(self.submit_timeout, receipt).await {
            Ok(Ok(outcome)) => outcome,
            // Loop dropped the waiter without resolving it: teardown.
            Ok(Err(_)) => Err(TensorError::Shutdown),
            // Deadline. Dropping `receipt` cancels the waiter; fan-out will
            // discard the orphaned result.
            Err(_) => Err(TensorError::SubmitTimeout),
        }
    }
}
