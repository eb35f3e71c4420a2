//! Content-addressed vector cache over an external KV store.
//!
//! [`VectorCache`] fronts a shared store (Redis in production) keyed by
//! [`fingerprint`](crate::fingerprint::fingerprint) hex strings. Values are
//! self-describing JSON arrays of numbers, so any process that can compute
//! the key can read them.
//!
//! # Degradation
//!
//! The store is optional by contract: an empty `REDIS_URL` — or a store that
//! is unreachable at startup — leaves the gateway running uncached. Read
//! errors degrade to all-miss; write errors are logged and swallowed. A
//! cache problem must never fail a user request or poison a batch.
//!
//! # The store seam
//!
//! [`VectorStore`] is the backend trait: `mget` returning raw bytes (or a
//! missing sentinel per key) and `set_ex` with a TTL. Tests inject in-memory
//! or failing stores through it; [`RedisStore`] is the production
//! implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::telemetry;

/// TTL applied to every vector written through: 30 days (2,592,000 s).
pub const VECTOR_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Backend contract for the vector cache.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fetch raw values for `keys`; the result has the same length as
    /// `keys`, with `None` for absent entries.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Store `value` under `key` with the given time-to-live.
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
}

/// Redis-backed [`VectorStore`] over a shared connection manager.
///
/// `ConnectionManager` is a cheap-to-clone handle that reconnects behind
/// the scenes, so one store instance serves every submitter and the
/// dispatcher concurrently.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the store at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl VectorStore for RedisStore {
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        // MGET with zero keys is a protocol error.
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = conn.mget(keys).await?;
        Ok(values)
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }
}

/// The vector cache used by the submitter fast path and batch fan-out.
#[derive(Clone)]
pub struct VectorCache {
    store: Option<Arc<dyn VectorStore>>,
}

impl VectorCache {
    /// A cache with no backing store: every probe misses, writes are no-ops.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// A cache over an explicit store (used by tests and embedders).
    pub fn with_store(store: Arc<dyn VectorStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Connect to the store at `url`, degrading to a disabled cache when
    /// the URL is empty or the store is unreachable.
    pub async fn connect(url: &str) -> Self {
        if url.is_empty() {
            info!("vector cache disabled (empty REDIS_URL)");
            return Self::disabled();
        }
        match RedisStore::connect(url).await {
            Ok(store) => Self::with_store(Arc::new(store)),
            Err(err) => {
                warn!(error = %err, url, "vector cache unreachable, running uncached");
                Self::disabled()
            }
        }
    }

    /// Whether a backing store is configured.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Probe the store for `keys`, decoding hits.
    ///
    /// Returns one entry per key: `Some(vector)` for a hit, `None` for a
    /// miss. Store errors degrade to all-miss; malformed values decode to a
    /// miss for that key only.
    pub async fn multi_get(&self, keys: &[String]) -> Vec<Option<Vec<f32>>> {
        let Some(store) = &self.store else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(keys.len() as u64);
            return vec![None; keys.len()];
        };

        let raw = match store.mget(keys).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, keys = keys.len(), "cache read failed, treating as all-miss");
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(keys.len() as u64);
                return vec![None; keys.len()];
            }
        };

        let vectors: Vec<Option<Vec<f32>>> = raw
            .into_iter()
            .zip(keys)
            .map(|(value, key)| {
                let bytes = value?;
                match serde_json::from_slice::<Vec<f32>>(&bytes) {
                    Ok(vector) => Some(vector),
                    Err(err) => {
                        debug!(key = %key, error = %err, "malformed cache entry, treating as miss");
                        None
                    }
                }
            })
            .collect();

        let hits = vectors.iter().filter(|v| v.is_some()).count() as u64;
        metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(hits);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(keys.len() as u64 - hits);
        vectors
    }

    /// Write one vector through with the standard TTL.
    ///
    /// Failures are logged and swallowed: a missed write costs one future
    /// recompute, never a failed request.
    pub async fn put(&self, key: &str, vector: &[f32]) {
        let Some(store) = &self.store else { return };

        let encoded = match serde_json::to_vec(vector) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "failed to encode vector for cache");
                return;
            }
        };

        if let Err(err) = store.set_ex(key, encoded, VECTOR_TTL).await {
            warn!(key, error = %err, "cache write failed, continuing");
        }
    }
}
