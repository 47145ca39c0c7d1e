//! Caching subsystem.
//!
//! - [`response::ResponseCache`]: TTL + LRU + memory-bounded cache of
//!   sampling results, keyed by request fingerprint. Owned by the
//!   [`SamplingClient`](crate::SamplingClient) or shared between clients.
//!
//! The loaded-template cache lives in [`TemplateStore`](crate::TemplateStore).

pub mod response;

pub use response::{
    CacheConfig, CacheEntry, CacheStats, CachedResponse, MAX_TTL, ResponseCache,
};
