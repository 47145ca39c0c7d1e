//! Traits for the external collaborators draupnir consumes.
//!
//! - [`SamplingBackend`]: the generation backend, treated as an opaque
//!   capability. Backends report failures as typed [`DraupnirError`]
//!   variants; adapters that only see error text go through
//!   [`classify_backend_message`](super::classify_backend_message).
//! - [`TemplateSource`]: where templates come from when they are not
//!   already loaded.
//! - [`ProgressNotifier`]: fire-and-forget progress reporting.
//!
//! [`DraupnirError`]: crate::DraupnirError

use async_trait::async_trait;
use tracing::info;

use crate::Result;
use crate::types::{BackendResponse, InvokeParams, RenderedPrompt, Template};

// ============================================================================
// Sampling backend
// ============================================================================

/// Generation backend.
///
/// Transient failures must be reported as `RateLimited`, `Timeout` or
/// `Network`; anything else is treated as permanent and not retried.
#[async_trait]
pub trait SamplingBackend: Send + Sync {
    /// Backend name for logging/metrics.
    fn name(&self) -> &str;

    /// Invoke the backend with a rendered prompt.
    async fn invoke(&self, prompt: &RenderedPrompt, params: &InvokeParams)
    -> Result<BackendResponse>;
}

// ============================================================================
// Template source
// ============================================================================

/// External template loader.
///
/// `Ok(None)` means "not found here"; the store then falls back to the
/// built-in templates.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Source name for logging/debugging.
    fn name(&self) -> &str;

    /// Load a template by id.
    async fn load_template(&self, id: &str) -> Result<Option<Template>>;
}

// ============================================================================
// Progress notifier
// ============================================================================

/// Fire-and-forget progress reporting.
///
/// Implementations must not block; failures are the notifier's problem.
pub trait ProgressNotifier: Send + Sync {
    /// Report `percent` (0 to 100) progress for the operation identified by `token`.
    fn notify(&self, token: &str, percent: u8, message: &str);
}

/// Notifier that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ProgressNotifier for NoopNotifier {
    fn notify(&self, _token: &str, _percent: u8, _message: &str) {}
}

/// Notifier that logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl ProgressNotifier for TracingNotifier {
    fn notify(&self, token: &str, percent: u8, message: &str) {
        info!(token, percent, message, "progress");
    }
}
