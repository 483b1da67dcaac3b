//! AST caching to avoid re-parsing repeated expressions
//!
//! Parsing is the most expensive step of evaluating a one-off expression, and
//! callers typically evaluate a small set of rule expressions against many
//! contexts. This module provides an LRU cache from expression text to its
//! parsed AST.
//!
//! # Configuration
//!
//! Cache size can be configured via the `EVALIS_CACHE_SIZE` environment variable:
//!
//! ```bash
//! # Keep more rules warm
//! export EVALIS_CACHE_SIZE=4096
//!
//! # Disable cache for debugging
//! export EVALIS_CACHE_SIZE=0
//! ```

use crate::ast::EvalisNode;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Environment variable read by [`AstCache::from_env`]
pub const CACHE_SIZE_ENV: &str = "EVALIS_CACHE_SIZE";

/// Capacity used when `EVALIS_CACHE_SIZE` is unset or invalid
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// Cache metrics for observability
///
/// Tracks cache hits, misses, and evictions to help tune cache size.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheMetrics {
    /// Hit rate between 0.0 and 1.0; 0.0 before any request
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache metrics at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Thread-safe LRU cache of parsed expressions
///
/// Entries are `Arc<EvalisNode>` so a hit is a pointer copy. Only successful
/// parses are stored; an expression with syntax errors is re-parsed (and
/// fails again) on every request.
///
/// # Example
///
/// ```
/// use evalis::cache::AstCache;
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
///
/// let cache = AstCache::new(NonZeroUsize::new(16).unwrap());
/// let first = cache.get_or_parse("a + 1", |e| evalis::parse_ast(e).into_result()).unwrap();
/// let second = cache.get_or_parse("a + 1", |e| evalis::parse_ast(e).into_result()).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
#[derive(Debug, Clone)]
pub struct AstCache {
    entries: Arc<Mutex<LruCache<String, Arc<EvalisNode>>>>,
    metrics: Arc<CacheMetrics>,
}

impl AstCache {
    /// Create a new cache holding at most `capacity` ASTs
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    /// Build a cache sized from `EVALIS_CACHE_SIZE`
    ///
    /// Returns `None` when the size is `0`, which disables caching.
    pub fn from_env() -> Option<Self> {
        let raw = std::env::var(CACHE_SIZE_ENV).ok();
        capacity_from(raw.as_deref()).map(Self::new)
    }

    /// Get a cached AST or parse the expression if not cached
    pub fn get_or_parse<F, E>(&self, expr: &str, parse_fn: F) -> Result<Arc<EvalisNode>, E>
    where
        F: FnOnce(&str) -> Result<EvalisNode, E>,
    {
        if let Some(cached) = self.lock().get(expr) {
            self.metrics.hits.fetch_add(1, Ordering::Relaxed);
            trace!(expr, "ast cache hit");
            return Ok(Arc::clone(cached));
        }

        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        trace!(expr, "ast cache miss");
        let node = Arc::new(parse_fn(expr)?);

        // Another thread may have parsed the same text meanwhile; last one wins
        let evicted = self.lock().push(expr.to_string(), Arc::clone(&node));
        if matches!(evicted, Some((ref key, _)) if key != expr) {
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }

        Ok(node)
    }

    /// Get a cached AST without parsing
    pub fn get(&self, expr: &str) -> Option<Arc<EvalisNode>> {
        self.lock().get(expr).cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    // A panic while holding the lock cannot leave the LRU half-updated
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<EvalisNode>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AstCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Interpret an `EVALIS_CACHE_SIZE` value
fn capacity_from(raw: Option<&str>) -> Option<NonZeroUsize> {
    let size = raw
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_CACHE_SIZE);
    NonZeroUsize::new(size)
}
