//! Backend-facing plumbing: collaborator traits, retry, error classification.

pub mod classify;
pub mod retry;
pub mod traits;

pub use classify::classify_backend_message;
pub use retry::{Retried, RetryConfig, with_retry};
pub use traits::{NoopNotifier, ProgressNotifier, SamplingBackend, TemplateSource, TracingNotifier};
