//! Batcher integration tests: coalescing, cache interplay, ordering,
//! isolation, and failure fan-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tensor::adapters::{AdapterCapabilities, ModelAdapter};
use tensor::batcher::{BatcherConfig, EmbedBatcher};
use tensor::cache::{VectorCache, VectorStore};
use tensor::fingerprint::fingerprint;
use tensor::{Result, TensorError};

// ============================================================================
// Test stores
// ============================================================================

/// In-memory [`VectorStore`] standing in for Redis.
#[derive(Default)]
struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    fn insert_vector(&self, key: &str, vector: &[f32]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), serde_json::to_vec(vector).unwrap());
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let entries = self.entries.lock().unwrap();
        Ok(keys.iter().map(|key| entries.get(key).cloned()).collect())
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, _ttl: Duration) -> Result<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// Store whose every operation errors, as if Redis were down.
struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn mget(&self, _keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        Err(TensorError::Cache("store down".to_string()))
    }

    async fn set_ex(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Err(TensorError::Cache("store down".to_string()))
    }
}

// ============================================================================
// Stub adapter
// ============================================================================

struct StubAdapter {
    name: &'static str,
    version: &'static str,
    calls: Mutex<Vec<Vec<String>>>,
    delay: Duration,
    fail: bool,
}

impl StubAdapter {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            version: "v1",
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    fn slow(name: &'static str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(name)
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

/// Deterministic per-text vector so positional fidelity is observable.
fn stub_vector(text: &str) -> Vec<f32> {
    vec![text.len() as f32, f32::from(text.as_bytes().first().copied().unwrap_or(0))]
}

#[async_trait]
impl ModelAdapter for StubAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &str {
        self.version
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            embed: true,
            ..AdapterCapabilities::default()
        }
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push(inputs.iter().map(|s| s.to_string()).collect());
        if self.fail {
            return Err(TensorError::Api {
                status: 502,
                message: "provider exploded".to_string(),
            });
        }
        Ok(inputs.iter().map(|text| stub_vector(text)).collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn quick_config() -> BatcherConfig {
    BatcherConfig {
        max_batch: 64,
        max_batch_wait: Duration::from_millis(50),
        submit_timeout: Duration::from_secs(5),
    }
}

fn spawn_batcher(
    cache: VectorCache,
    config: BatcherConfig,
) -> (EmbedBatcher, watch::Sender<bool>, JoinHandle<()>) {
    let (batcher, dispatch) = EmbedBatcher::new(cache, config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(dispatch.run(shutdown_rx));
    (batcher, shutdown_tx, handle)
}

fn inputs(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

/// S1: cold cache, single request — everything computed, then written through.
#[tokio::test]
async fn cold_cache_single_request() {
    let store = Arc::new(MemoryStore::default());
    let (batcher, _shutdown, _loop) =
        spawn_batcher(VectorCache::with_store(store.clone()), quick_config());
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let outcome = batcher
        .submit(adapter.clone(), inputs(&["hello", "world"]))
        .await
        .unwrap();

    assert_eq!(outcome.adapter_name, "local/m");
    assert_eq!(outcome.adapter_version, "v1");
    assert_eq!(outcome.vectors.len(), 2);
    assert_eq!(outcome.vectors[0], stub_vector("hello"));
    assert_eq!(outcome.vectors[1], stub_vector("world"));
    assert_eq!(outcome.cached, vec![false, false]);
    assert_eq!(adapter.call_count(), 1);

    // Write-through is keyed by sha256(name ∥ version ∥ text).
    assert!(store.contains(&fingerprint("local/m", "v1", "hello")));
    assert!(store.contains(&fingerprint("local/m", "v1", "world")));
}

/// S2: warm cache — second identical request never reaches the adapter.
#[tokio::test]
async fn warm_cache_skips_adapter() {
    let store = Arc::new(MemoryStore::default());
    let (batcher, _shutdown, _loop) =
        spawn_batcher(VectorCache::with_store(store), quick_config());
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let first = batcher
        .submit(adapter.clone(), inputs(&["hello", "world"]))
        .await
        .unwrap();
    let second = batcher
        .submit(adapter.clone(), inputs(&["hello", "world"]))
        .await
        .unwrap();

    assert_eq!(second.cached, vec![true, true]);
    assert_eq!(second.vectors, first.vectors);
    assert_eq!(adapter.call_count(), 1);
}

/// S3: concurrent requests coalesce into one adapter call with duplicates
/// removed, and each response stays positionally correct.
#[tokio::test]
async fn concurrent_requests_coalesce_and_dedupe() {
    let store = Arc::new(MemoryStore::default());
    let (batcher, _shutdown, _loop) =
        spawn_batcher(VectorCache::with_store(store), quick_config());
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let (first, second) = tokio::join!(
        batcher.submit(adapter.clone(), inputs(&["a", "b"])),
        batcher.submit(adapter.clone(), inputs(&["b", "c"])),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    let calls = adapter.calls();
    assert_eq!(calls.len(), 1, "expected one coalesced adapter call");
    let mut seen = calls[0].clone();
    seen.sort();
    assert_eq!(seen, vec!["a", "b", "c"]);

    assert_eq!(first.vectors, vec![stub_vector("a"), stub_vector("b")]);
    assert_eq!(second.vectors, vec![stub_vector("b"), stub_vector("c")]);
}

/// S4: requests on different adapters never share a batch.
#[tokio::test]
async fn mixed_adapters_split_batches() {
    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), quick_config());
    let alpha = Arc::new(StubAdapter::new("alpha"));
    let beta = Arc::new(StubAdapter::new("beta"));

    let (first, second) = tokio::join!(
        batcher.submit(alpha.clone(), inputs(&["a1", "a2"])),
        batcher.submit(beta.clone(), inputs(&["b1"])),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(alpha.call_count(), 1);
    assert_eq!(beta.call_count(), 1);
    let mut alpha_inputs = alpha.calls()[0].clone();
    alpha_inputs.sort();
    assert_eq!(alpha_inputs, vec!["a1", "a2"]);
    assert_eq!(beta.calls()[0], vec!["b1"]);

    assert_eq!(first.adapter_name, "alpha");
    assert_eq!(second.adapter_name, "beta");
}

/// S5: a dead cache store degrades to all-miss; requests still succeed.
#[tokio::test]
async fn cache_store_down_degrades_to_miss() {
    let (batcher, _shutdown, _loop) = spawn_batcher(
        VectorCache::with_store(Arc::new(FailingStore)),
        quick_config(),
    );
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let outcome = batcher
        .submit(adapter.clone(), inputs(&["x", "y"]))
        .await
        .unwrap();

    assert_eq!(outcome.vectors.len(), 2);
    assert_eq!(outcome.cached, vec![false, false]);
    assert_eq!(adapter.call_count(), 1);
}

/// S6: an adapter failure reaches every waiter in the batch with the same
/// error, and the loop keeps serving afterwards.
#[tokio::test]
async fn adapter_failure_fails_all_waiters_and_loop_survives() {
    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), quick_config());
    let broken = Arc::new(StubAdapter::failing("broken"));

    let (first, second) = tokio::join!(
        batcher.submit(broken.clone(), inputs(&["a"])),
        batcher.submit(broken.clone(), inputs(&["b"])),
    );

    for result in [first, second] {
        match result {
            Err(TensorError::Api { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "provider exploded");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    // The loop is still alive and serves the next request.
    let healthy = Arc::new(StubAdapter::new("healthy"));
    let outcome = batcher
        .submit(healthy, inputs(&["recovered"]))
        .await
        .unwrap();
    assert_eq!(outcome.vectors.len(), 1);
}

// ============================================================================
// Invariants
// ============================================================================

/// Duplicate texts within one request produce one provider occurrence.
#[tokio::test]
async fn duplicate_inputs_share_one_provider_slot() {
    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), quick_config());
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let outcome = batcher
        .submit(adapter.clone(), inputs(&["x", "x", "x"]))
        .await
        .unwrap();

    assert_eq!(adapter.calls(), vec![vec!["x"]]);
    assert_eq!(outcome.vectors.len(), 3);
    assert!(outcome.vectors.iter().all(|v| *v == stub_vector("x")));
}

/// A partially warm cache only sends the misses to the provider.
#[tokio::test]
async fn partial_hits_only_compute_misses() {
    let store = Arc::new(MemoryStore::default());
    store.insert_vector(&fingerprint("local/m", "v1", "hello"), &[9.0, 9.0]);

    let (batcher, _shutdown, _loop) =
        spawn_batcher(VectorCache::with_store(store), quick_config());
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let outcome = batcher
        .submit(adapter.clone(), inputs(&["hello", "fresh"]))
        .await
        .unwrap();

    assert_eq!(outcome.cached, vec![true, false]);
    assert_eq!(outcome.vectors[0], vec![9.0, 9.0]);
    assert_eq!(outcome.vectors[1], stub_vector("fresh"));
    assert_eq!(adapter.calls(), vec![vec!["fresh"]]);
}

/// Empty input lists resolve immediately without touching the queue.
#[tokio::test]
async fn empty_inputs_short_circuit() {
    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), quick_config());
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let outcome = batcher.submit(adapter.clone(), Vec::new()).await.unwrap();

    assert!(outcome.vectors.is_empty());
    assert!(outcome.cached.is_empty());
    assert_eq!(adapter.call_count(), 0);
}

/// An under-filled batch departs after the wait window, not the submit
/// deadline.
#[tokio::test]
async fn bounded_latency_for_underfilled_batch() {
    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), quick_config());
    let adapter = Arc::new(StubAdapter::new("local/m"));

    let started = Instant::now();
    batcher
        .submit(adapter, inputs(&["only"]))
        .await
        .unwrap();

    assert!(
        started.elapsed() < Duration::from_secs(2),
        "single item should depart after the batch window"
    );
}

/// A cancelled waiter does not disturb the rest of its batch.
#[tokio::test]
async fn cancelled_waiter_is_isolated() {
    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), quick_config());
    let adapter = Arc::new(StubAdapter::slow("local/m", Duration::from_millis(200)));

    let impatient = {
        let batcher = batcher.clone();
        let adapter = adapter.clone();
        tokio::spawn(async move {
            tokio::time::timeout(
                Duration::from_millis(100),
                batcher.submit(adapter, inputs(&["dropped"])),
            )
            .await
        })
    };
    let patient = batcher.submit(adapter.clone(), inputs(&["kept"]));

    let (impatient, patient) = tokio::join!(impatient, patient);
    assert!(impatient.unwrap().is_err(), "impatient waiter should time out");

    let outcome = patient.unwrap();
    assert_eq!(outcome.vectors, vec![stub_vector("kept")]);
    // Both items coalesced; the orphaned result was discarded in fan-out.
    assert_eq!(adapter.call_count(), 1);
}

/// The configured submit deadline surfaces as a timeout error.
#[tokio::test]
async fn submit_deadline_times_out() {
    let config = BatcherConfig {
        submit_timeout: Duration::from_millis(20),
        ..quick_config()
    };
    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), config);
    let adapter = Arc::new(StubAdapter::slow("local/m", Duration::from_millis(300)));

    let result = batcher.submit(adapter, inputs(&["slow"])).await;
    assert!(matches!(result, Err(TensorError::SubmitTimeout)));
}

/// Shutdown drains the queue by failing waiters with a shutdown error.
#[tokio::test]
async fn shutdown_fails_queued_waiters() {
    let (batcher, dispatch) = EmbedBatcher::new(VectorCache::disabled(), quick_config());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let adapter = Arc::new(StubAdapter::new("local/m"));
    let pending = {
        let batcher = batcher.clone();
        tokio::spawn(async move { batcher.submit(adapter, inputs(&["queued"])).await })
    };
    // Let the submitter enqueue before the loop starts and sees the signal.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let handle = tokio::spawn(dispatch.run(shutdown_rx));
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(TensorError::Shutdown)));
    handle.await.unwrap();
}

/// An adapter that returns the wrong number of vectors fails the batch.
#[tokio::test]
async fn length_mismatch_fails_the_batch() {
    struct ShortAdapter;

    #[async_trait]
    impl ModelAdapter for ShortAdapter {
        fn name(&self) -> &str {
            "short"
        }

        fn version(&self) -> &str {
            "v1"
        }

        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities {
                embed: true,
                ..AdapterCapabilities::default()
            }
        }

        async fn embed_batch(&self, _inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    let (batcher, _shutdown, _loop) = spawn_batcher(VectorCache::disabled(), quick_config());
    let result = batcher
        .submit(Arc::new(ShortAdapter), inputs(&["a", "b"]))
        .await;

    assert!(matches!(
        result,
        Err(TensorError::LengthMismatch {
            expected: 2,
            got: 1
        })
    ));
}
