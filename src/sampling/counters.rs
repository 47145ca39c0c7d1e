//! Per-client counters and their read-only snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::DraupnirError;

/// Read-only snapshot of a [`SamplingClient`](super::SamplingClient)'s counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SamplingMetrics {
    pub total_requests: u64,
    pub total_errors: u64,
    pub cache_hits: u64,
    pub backend_invocations: u64,
    pub last_error: Option<String>,
    /// Templates currently loaded in the template store.
    pub template_cache_size: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ClientCounters {
    requests: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    invocations: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ClientCounters {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, error: &DraupnirError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }

    pub(crate) fn snapshot(&self, template_cache_size: usize) -> SamplingMetrics {
        SamplingMetrics {
            total_requests: self.requests.load(Ordering::Relaxed),
            total_errors: self.errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            backend_invocations: self.invocations.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            template_cache_size,
        }
    }

    pub(crate) fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.invocations.store(0, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
