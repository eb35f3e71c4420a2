//! The dispatch loop: batch forming, provider calls, and result fan-out.
//!
//! One long-lived task owns the queue's receiving end. Each cycle blocks
//! for a head item, keeps the batch open until `max_batch` items or the
//! wait window closes, dispatches, and loops. Two invariants hold for every
//! dispatched batch:
//!
//! - **Homogeneity** — all items share one adapter identity. The first item
//!   with a different identity is parked in a single-item lookahead buffer
//!   and opens the next batch (the queue itself has no push-back).
//! - **Isolation** — a batch either resolves every waiter with its own
//!   positionally ordered results, or fails every waiter with the same
//!   error. Cancelled waiters are skipped silently either way.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use super::{BatcherConfig, EmbedOutcome, WorkItem};
use crate::adapters::ModelAdapter;
use crate::cache::VectorCache;
use crate::error::{Result, TensorError};
use crate::fingerprint::fingerprint;
use crate::telemetry;

/// The batcher's single consumer. Created by
/// [`EmbedBatcher::new`](super::EmbedBatcher::new), spawned once by the
/// composition root.
pub struct DispatchLoop {
    rx: mpsc::UnboundedReceiver<WorkItem>,
    cache: VectorCache,
    max_batch: usize,
    max_wait: std::time::Duration,
    /// Holds a prefetched item whose adapter differed from the closing
    /// batch; it becomes the next batch's head.
    lookahead: Option<WorkItem>,
}

impl DispatchLoop {
    pub(super) fn new(
        rx: mpsc::UnboundedReceiver<WorkItem>,
        cache: VectorCache,
        config: BatcherConfig,
    ) -> Self {
        Self {
            rx,
            cache,
            max_batch: config.max_batch,
            max_wait: config.max_batch_wait,
            lookahead: None,
        }
    }

    /// Run until the queue closes or `shutdown` signals.
    ///
    /// On shutdown the queue is closed and every work item still waiting —
    /// lookahead included — fails with [`TensorError::Shutdown`].
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let head = match self.lookahead.take() {
                Some(item) => item,
                None => {
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        item = self.rx.recv() => match item {
                            Some(item) => item,
                            None => break,
                        },
                    }
                }
            };

            let batch = self.collect_batch(head).await;
            self.dispatch(batch).await;
        }

        self.drain();
    }

    /// Fill a batch starting from `head` until size or window closes.
    ///
    /// Items are appended in arrival order; an item with a different
    /// adapter identity closes the batch and is parked as lookahead.
    async fn collect_batch(&mut self, head: WorkItem) -> Vec<WorkItem> {
        let deadline = Instant::now() + self.max_wait;
        let mut batch = vec![head];

        while batch.len() < self.max_batch {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match timeout(remaining, self.rx.recv()).await {
                Ok(Some(item)) => {
                    let head = &batch[0];
                    if item.adapter.name() != head.adapter.name()
                        || item.adapter.version() != head.adapter.version()
                    {
                        self.lookahead = Some(item);
                        break;
                    }
                    batch.push(item);
                }
                // Queue closed; dispatch what we have.
                Ok(None) => break,
                // Window elapsed.
                Err(_) => break,
            }
        }

        batch
    }

    /// Dispatch one batch and resolve every waiter exactly once.
    async fn dispatch(&self, batch: Vec<WorkItem>) {
        let Some(head) = batch.first() else { return };
        let adapter = head.adapter.clone();

        metrics::histogram!(telemetry::BATCH_ITEMS).record(batch.len() as f64);
        debug!(
            adapter = adapter.name(),
            items = batch.len(),
            inputs = batch.iter().map(|i| i.inputs.len()).sum::<usize>(),
            "dispatching batch"
        );

        match self.run_batch(adapter.as_ref(), &batch).await {
            Ok((vectors, cached)) => {
                metrics::counter!(telemetry::BATCHES_TOTAL, "status" => "ok").increment(1);
                fan_out(adapter.as_ref(), batch, vectors, cached);
            }
            Err(err) => {
                metrics::counter!(telemetry::BATCHES_TOTAL, "status" => "error").increment(1);
                warn!(adapter = adapter.name(), error = %err, "batch failed, failing all waiters");
                for item in batch {
                    if item.waiter.send(Err(err.clone())).is_err() {
                        debug!(job_id = %item.job_id, "waiter cancelled before error fan-out");
                    }
                }
            }
        }
    }

    /// Resolve one batch's flat inputs to vectors and cached flags.
    ///
    /// Re-probes the cache (absorbing fills from other batches since the
    /// submitters' probes), calls the adapter once with the **distinct**
    /// missing texts in first-occurrence order, and writes computed vectors
    /// through with the standard TTL.
    async fn run_batch(
        &self,
        adapter: &dyn ModelAdapter,
        batch: &[WorkItem],
    ) -> Result<(Vec<Vec<f32>>, Vec<bool>)> {
        let flat: Vec<&str> = batch
            .iter()
            .flat_map(|item| item.inputs.iter().map(String::as_str))
            .collect();
        let keys: Vec<String> = flat
            .iter()
            .map(|text| fingerprint(adapter.name(), adapter.version(), text))
            .collect();

        let mut vectors: Vec<Option<Vec<f32>>> = self.cache.multi_get(&keys).await;
        let cached: Vec<bool> = vectors.iter().map(Option::is_some).collect();

        // Distinct missing texts, first-occurrence order. Duplicate inputs
        // across (or within) items share one provider slot and one write.
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        let mut missing: Vec<&str> = Vec::new();
        let mut missing_key_at: Vec<usize> = Vec::new();
        for (index, vector) in vectors.iter().enumerate() {
            if vector.is_none() && !slot_of.contains_key(flat[index]) {
                slot_of.insert(flat[index], missing.len());
                missing.push(flat[index]);
                missing_key_at.push(index);
            }
        }

        if !missing.is_empty() {
            let computed = match adapter.embed_batch(&missing).await {
                Ok(computed) => {
                    metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
                        "provider" => adapter.name().to_string(), "status" => "ok")
                    .increment(1);
                    computed
                }
                Err(err) => {
                    metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
                        "provider" => adapter.name().to_string(), "status" => "error")
                    .increment(1);
                    return Err(err);
                }
            };

            if computed.len() != missing.len() {
                return Err(TensorError::LengthMismatch {
                    expected: missing.len(),
                    got: computed.len(),
                });
            }

            for (slot, vector) in computed.iter().enumerate() {
                self.cache.put(&keys[missing_key_at[slot]], vector).await;
            }

            for (index, entry) in vectors.iter_mut().enumerate() {
                if entry.is_none() {
                    *entry = Some(computed[slot_of[flat[index]]].clone());
                }
            }
        }

        Ok((vectors.into_iter().flatten().collect(), cached))
    }

    /// Fail everything still queued with a shutdown error.
    fn drain(&mut self) {
        self.rx.close();

        let mut pending: Vec<WorkItem> = self.lookahead.take().into_iter().collect();
        while let Ok(item) = self.rx.try_recv() {
            pending.push(item);
        }

        if !pending.is_empty() {
            debug!(items = pending.len(), "failing queued items on shutdown");
        }
        for item in pending {
            let _ = item.waiter.send(Err(TensorError::Shutdown));
        }
    }
}

/// Split a batch's flat results back into per-item outcomes.
///
/// Inputs were flattened in item order, so each item's share is the next
/// `inputs.len()` entries; positions within an item are preserved end to
/// end. Waiters that disappeared (submitter timeout) are skipped.
fn fan_out(
    adapter: &dyn ModelAdapter,
    batch: Vec<WorkItem>,
    vectors: Vec<Vec<f32>>,
    cached: Vec<bool>,
) {
    let mut vectors = vectors.into_iter();
    let mut cached = cached.into_iter();

    for item in batch {
        let count = item.inputs.len();
        let outcome = EmbedOutcome {
            adapter_name: adapter.name().to_string(),
            adapter_version: adapter.version().to_string(),
            vectors: vectors.by_ref().take(count).collect(),
            cached: cached.by_ref().take(count).collect(),
        };

        if item.waiter.send(Ok(outcome)).is_err() {
            debug!(job_id = %item.job_id, "waiter cancelled, discarding batch result");
        }
    }
}
