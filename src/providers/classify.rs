//! Heuristic classification of untyped backend failures.
//!
//! Some backends only surface error text. This is the single place where
//! message content is inspected; the retry loop only ever looks at the
//! resulting [`DraupnirError`] variant.

use std::time::Duration;

use crate::DraupnirError;

/// Map a raw backend error message to a typed error.
///
/// Rate limits, timeouts and transient network failures become retryable
/// variants; everything else becomes a permanent `InvalidRequest`.
pub fn classify_backend_message(message: &str) -> DraupnirError {
    let msg = message.to_lowercase();
    if msg.contains("rate limit") || msg.contains("too many requests") || msg.contains("429") {
        DraupnirError::RateLimited { retry_after: None }
    } else if msg.contains("timeout") || msg.contains("timed out") {
        DraupnirError::Timeout(Duration::ZERO)
    } else if msg.contains("econnreset")
        || msg.contains("connection reset")
        || msg.contains("connection refused")
        || msg.contains("network")
        || msg.contains("temporarily unavailable")
        || msg.contains("503")
        || msg.contains("502")
    {
        DraupnirError::Network(message.to_string())
    } else {
        DraupnirError::InvalidRequest(message.to_string())
    }
}
