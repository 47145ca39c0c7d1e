//! Response cache for sampling results.
//!
//! [`ResponseCache`] stores backend responses keyed by the request
//! [`fingerprint`](crate::GenerationRequest::fingerprint). Three policies
//! bound it at once:
//!
//! - **TTL**: each entry expires `effective_ttl` after creation, where the
//!   effective TTL is the per-template override if configured, else the
//!   default. Expired entries are dropped lazily on access (counted as a
//!   TTL eviction and reported as a miss) or eagerly by
//!   [`cleanup()`](ResponseCache::cleanup).
//! - **LRU**: inserting a new key into a full cache evicts the single
//!   least-recently-accessed entry. Ties on access time go to the entry
//!   with the fewest accesses, then to the oldest insertion.
//! - **Memory budget**: every entry carries an approximate byte size;
//!   inserts keep evicting LRU entries until the new entry fits. An entry
//!   larger than the whole budget is not cached.
//!
//! # Concurrency
//!
//! One mutex guards the entry table and counters. Every operation is O(1)
//! amortized except eviction and sweeps, which scan the table. The lock is
//! never held across an await point.
//!
//! # Time
//!
//! Timestamps use [`tokio::time::Instant`], so tests can drive expiry with
//! a paused clock and `tokio::time::advance`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use regex::Regex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::telemetry;
use crate::types::{GenerationRequest, TokenUsage};
use crate::{DraupnirError, Result};

/// Fixed per-entry bookkeeping overhead added to the size estimate.
const ENTRY_OVERHEAD_BYTES: usize = 64;

/// Longest TTL an entry can get. Larger configured values, such as
/// `Duration::MAX` for "never expire", are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Configuration for the response cache.
///
/// ```rust
/// # use draupnir::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(500)
///     .default_ttl(Duration::from_secs(600))
///     .template_ttl("repository-analysis", Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether get/set are active at construction. Default: true.
    pub enabled: bool,
    /// TTL for templates without an override. Default: 15 minutes.
    pub default_ttl: Duration,
    /// Maximum number of entries. Default: 1,000.
    pub max_size: usize,
    /// Approximate memory budget in bytes. Default: 50 MiB.
    pub max_memory_bytes: usize,
    /// Cache failed responses too. Default: false.
    pub cache_failures: bool,
    /// Per-template TTL overrides.
    pub template_ttls: HashMap<String, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(15 * 60),
            max_size: 1_000,
            max_memory_bytes: 50 * 1024 * 1024,
            cache_failures: false,
            template_ttls: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    pub fn max_memory_bytes(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn cache_failures(mut self, enabled: bool) -> Self {
        self.cache_failures = enabled;
        self
    }

    /// Override the TTL for one template.
    pub fn template_ttl(mut self, template_id: impl Into<String>, ttl: Duration) -> Self {
        self.template_ttls.insert(template_id.into(), ttl);
        self
    }

    /// TTL applied to entries of `template_id`, at most [`MAX_TTL`].
    pub fn effective_ttl(&self, template_id: &str) -> Duration {
        self.template_ttls
            .get(template_id)
            .copied()
            .unwrap_or(self.default_ttl)
            .min(MAX_TTL)
    }
}

/// Cached value: a backend response, or a recorded failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub content: String,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    /// `false` for a cached failure; `content` then holds the error message.
    pub success: bool,
}

impl CachedResponse {
    /// A successful response.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            usage: None,
            success: true,
        }
    }

    /// A failure, stored only when failure caching is enabled.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            model: None,
            usage: None,
            success: false,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }
}

/// One cached entry. Owned by the cache; callers only see clones.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: CachedResponse,
    pub template_id: String,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    pub size_bytes: usize,
    seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Snapshot of cache statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub memory_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub ttl_evictions: u64,
    pub lru_evictions: u64,
    pub memory_evictions: u64,
    /// `hits / (hits + misses)`, 0.0 before any lookup.
    pub hit_rate: f64,
    /// Mean content length of stored responses, in bytes.
    pub average_response_bytes: f64,
    /// Templates ordered by lookup count, most accessed first.
    pub top_templates: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Copy)]
enum EvictionReason {
    Ttl,
    Lru,
    Memory,
}

impl EvictionReason {
    fn label(self) -> &'static str {
        match self {
            EvictionReason::Ttl => "ttl",
            EvictionReason::Lru => "lru",
            EvictionReason::Memory => "memory",
        }
    }
}

/// Raised internally when an entry cannot fit the memory budget even in
/// an empty cache. Never surfaced to callers.
#[derive(Debug)]
struct CapacityExceeded {
    size_bytes: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    ttl_evictions: u64,
    lru_evictions: u64,
    memory_evictions: u64,
    stored_response_bytes: u64,
    template_accesses: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    memory_bytes: usize,
    next_seq: u64,
    counters: Counters,
}

impl State {
    fn remove(&mut self, key: &str, reason: Option<EvictionReason>) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.memory_bytes = self.memory_bytes.saturating_sub(entry.size_bytes);
        if let Some(reason) = reason {
            match reason {
                EvictionReason::Ttl => self.counters.ttl_evictions += 1,
                EvictionReason::Lru => self.counters.lru_evictions += 1,
                EvictionReason::Memory => self.counters.memory_evictions += 1,
            }
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => reason.label())
                .increment(1);
        }
        Some(entry)
    }

    /// Evict the least-recently-used entry. Returns false if empty.
    fn evict_lru(&mut self, reason: EvictionReason) -> bool {
        let victim = self
            .entries
            .values()
            .min_by_key(|e| (e.last_accessed_at, e.access_count, e.seq))
            .map(|e| e.key.clone());
        match victim {
            Some(key) => {
                debug!(key = %key, reason = reason.label(), "evicting cache entry");
                self.remove(&key, Some(reason));
                true
            }
            None => false,
        }
    }

    /// Make room for an incoming entry of `size_bytes` under `key`.
    fn make_room(
        &mut self,
        key: &str,
        size_bytes: usize,
        config: &CacheConfig,
    ) -> std::result::Result<(), CapacityExceeded> {
        if size_bytes > config.max_memory_bytes || config.max_size == 0 {
            return Err(CapacityExceeded { size_bytes });
        }
        if self.remove(key, None).is_none() && self.entries.len() >= config.max_size {
            self.evict_lru(EvictionReason::Lru);
        }
        while self.memory_bytes + size_bytes > config.max_memory_bytes {
            if !self.evict_lru(EvictionReason::Memory) {
                return Err(CapacityExceeded { size_bytes });
            }
        }
        Ok(())
    }
}

/// In-memory TTL + LRU + memory-bounded response cache.
///
/// One instance per process (or per test); share it with `Arc`.
pub struct ResponseCache {
    config: CacheConfig,
    enabled: AtomicBool,
    state: Mutex<State>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            config,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toggle get/set at runtime. Existing entries are kept and continue
    /// to expire.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Look up a response.
    ///
    /// Returns `None` on miss, on expiry, or while the cache is disabled.
    pub fn get(&self, request: &GenerationRequest) -> Option<CachedResponse> {
        if !self.is_enabled() {
            return None;
        }
        let key = request.fingerprint();
        let now = Instant::now();
        let mut guard = self.state();
        let state = &mut *guard;

        *state
            .counters
            .template_accesses
            .entry(request.template_id.clone())
            .or_insert(0) += 1;

        let expired = match state.entries.get_mut(&key) {
            None => false,
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                entry.last_accessed_at = now;
                entry.access_count += 1;
                let value = entry.value.clone();
                state.counters.hits += 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL,
                    "template" => request.template_id.clone(),
                )
                .increment(1);
                return Some(value);
            }
        };

        if expired {
            debug!(key = %key, template = %request.template_id, "cache entry expired");
            state.remove(&key, Some(EvictionReason::Ttl));
        }
        state.counters.misses += 1;
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL,
            "template" => request.template_id.clone(),
        )
        .increment(1);
        None
    }

    /// Store a response. Returns whether it was stored.
    ///
    /// Failures (`value.success == false`) are ignored unless
    /// `cache_failures` is enabled, in which case they follow the same
    /// TTL, LRU and memory rules as successes.
    pub fn set(&self, request: &GenerationRequest, value: CachedResponse) -> bool {
        if !self.is_enabled() || (!value.success && !self.config.cache_failures) {
            return false;
        }
        let key = request.fingerprint();
        let size_bytes = estimate_size(&key, &request.template_id, &value);
        let ttl = self.config.effective_ttl(&request.template_id);
        let now = Instant::now();
        let mut state = self.state();

        if let Err(exceeded) = state.make_room(&key, size_bytes, &self.config) {
            debug!(
                key = %key,
                size_bytes = exceeded.size_bytes,
                max_memory_bytes = self.config.max_memory_bytes,
                "response too large for cache"
            );
            return false;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.memory_bytes += size_bytes;
        state.counters.sets += 1;
        state.counters.stored_response_bytes += value.content.len() as u64;
        state.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                template_id: request.template_id.clone(),
                created_at: now,
                expires_at: now + ttl,
                last_accessed_at: now,
                access_count: 0,
                size_bytes,
                seq,
            },
        );
        true
    }

    /// Inspect an entry without touching its LRU position or the stats.
    pub fn peek(&self, request: &GenerationRequest) -> Option<CacheEntry> {
        self.state().entries.get(&request.fingerprint()).cloned()
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, request: &GenerationRequest) -> bool {
        self.state().remove(&request.fingerprint(), None).is_some()
    }

    /// Remove every entry whose template id or key matches the regex
    /// `pattern`. Returns the number removed.
    pub fn invalidate(&self, pattern: &str) -> Result<usize> {
        let re = Regex::new(pattern)
            .map_err(|e| DraupnirError::InvalidInput(format!("invalid pattern: {e}")))?;
        let mut state = self.state();
        let keys: Vec<String> = state
            .entries
            .values()
            .filter(|e| re.is_match(&e.template_id) || re.is_match(&e.key))
            .map(|e| e.key.clone())
            .collect();
        for key in &keys {
            state.remove(key, None);
        }
        Ok(keys.len())
    }

    /// Remove all entries. Statistics are kept.
    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.memory_bytes = 0;
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state();
        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key.clone())
            .collect();
        for key in &expired {
            state.remove(key, Some(EvictionReason::Ttl));
        }
        if !expired.is_empty() {
            debug!(evicted = expired.len(), "cache cleanup");
        }
        expired.len()
    }

    /// Run [`cleanup()`](Self::cleanup) every `interval` until `cancel` fires.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.cleanup();
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }

    /// Number of entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate bytes held.
    pub fn memory_usage(&self) -> usize {
        self.state().memory_bytes
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        let c = &state.counters;
        let lookups = c.hits + c.misses;
        CacheStats {
            entries: state.entries.len(),
            memory_bytes: state.memory_bytes,
            hits: c.hits,
            misses: c.misses,
            sets: c.sets,
            ttl_evictions: c.ttl_evictions,
            lru_evictions: c.lru_evictions,
            memory_evictions: c.memory_evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                c.hits as f64 / lookups as f64
            },
            average_response_bytes: if c.sets == 0 {
                0.0
            } else {
                c.stored_response_bytes as f64 / c.sets as f64
            },
            top_templates: top_n(&c.template_accesses, usize::MAX),
        }
    }

    /// The `n` most looked-up templates.
    pub fn top_templates(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.state().counters.template_accesses, n)
    }

    /// Reset all counters. Entries are kept.
    pub fn reset_stats(&self) {
        self.state().counters = Counters::default();
    }

    /// Reset the hit and miss counts behind `hit_rate`.
    pub fn reset_hit_rate(&self) {
        let mut state = self.state();
        state.counters.hits = 0;
        state.counters.misses = 0;
    }

    /// Forget per-template lookup counts.
    pub fn reset_top_templates(&self) {
        self.state().counters.template_accesses.clear();
    }

    /// Reset the totals behind `average_response_bytes`.
    pub fn reset_average_response_size(&self) {
        let mut state = self.state();
        state.counters.sets = 0;
        state.counters.stored_response_bytes = 0;
    }
}

fn top_n(accesses: &HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut all: Vec<(String, u64)> = accesses.iter().map(|(k, v)| (k.clone(), *v)).collect();
    all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    all.truncate(n);
    all
}

fn estimate_size(key: &str, template_id: &str, value: &CachedResponse) -> usize {
    key.len()
        + template_id.len()
        + value.content.len()
        + value.model.as_ref().map_or(0, String::len)
        + ENTRY_OVERHEAD_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: &str) -> GenerationRequest {
        GenerationRequest::new("tmpl").var("id", id)
    }

    #[test]
    fn effective_ttl_prefers_override() {
        let config = CacheConfig::new()
            .default_ttl(Duration::from_secs(10))
            .template_ttl("slow", Duration::from_secs(99));
        assert_eq!(config.effective_ttl("slow"), Duration::from_secs(99));
        assert_eq!(config.effective_ttl("other"), Duration::from_secs(10));
    }

    #[test]
    fn effective_ttl_is_clamped() {
        let config = CacheConfig::new()
            .default_ttl(Duration::MAX)
            .template_ttl("forever", Duration::MAX);
        assert_eq!(config.effective_ttl("other"), MAX_TTL);
        assert_eq!(config.effective_ttl("forever"), MAX_TTL);
    }

    #[test]
    fn top_n_orders_by_count_then_name() {
        let mut m = HashMap::new();
        m.insert("b".to_string(), 3);
        m.insert("a".to_string(), 3);
        m.insert("c".to_string(), 5);
        assert_eq!(
            top_n(&m, 2),
            vec![("c".to_string(), 5), ("a".to_string(), 3)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn memory_accounting_tracks_removals() {
        let cache = ResponseCache::new(CacheConfig::new());
        cache.set(&req("a"), CachedResponse::success("hello"));
        let used = cache.memory_usage();
        assert!(used > 0);
        assert!(cache.delete(&req("a")));
        assert_eq!(cache.memory_usage(), 0);
    }
}
