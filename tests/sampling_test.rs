//! Tests for [`SamplingClient`]: template resolution, retry, cancellation,
//! format validation and cache integration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use draupnir::{
    BackendResponse, CacheConfig, CancellationToken, DraupnirError, GenerationRequest,
    InvokeParams, OutputFormat, RenderedPrompt, ResponseCache, Result, RetryConfig,
    SamplingBackend, SamplingClient, Template, TemplateStore, TokenUsage, VariableDecl,
};

/// Mock backend that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> DraupnirError,
    content: &'static str,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> DraupnirError) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            content: "FROM python:3.12-slim\nUSER app\n",
            total_calls: AtomicU32::new(0),
        }
    }

    fn ok(content: &'static str) -> Self {
        Self {
            content,
            ..Self::new(0, || DraupnirError::Network("unused".into()))
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SamplingBackend for FailThenSucceed {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, _prompt: &RenderedPrompt, _params: &InvokeParams) -> Result<BackendResponse> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err((self.fail_with)());
        }
        Ok(BackendResponse::new(self.content)
            .with_model("mock-model")
            .with_usage(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }))
    }
}

/// Mock backend that records the prompt it was given.
#[derive(Default)]
struct Recording {
    last_user: std::sync::Mutex<Option<String>>,
    last_format: std::sync::Mutex<Option<OutputFormat>>,
}

#[async_trait]
impl SamplingBackend for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    async fn invoke(&self, prompt: &RenderedPrompt, params: &InvokeParams) -> Result<BackendResponse> {
        *self.last_user.lock().unwrap() = Some(prompt.user.clone());
        *self.last_format.lock().unwrap() = Some(params.format);
        Ok(BackendResponse::new("ok"))
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .retry_attempts(3)
        .retry_delay(Duration::from_millis(100))
}

fn dockerfile_request() -> GenerationRequest {
    GenerationRequest::new("dockerfile-generation")
        .var("app_name", "api")
        .var("language", "python")
}

fn rate_limited() -> DraupnirError {
    DraupnirError::RateLimited { retry_after: None }
}

// =========================================================================
// Retry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn retries_then_succeeds() {
    let backend = Arc::new(FailThenSucceed::new(3, rate_limited));
    let client = SamplingClient::builder(backend.clone())
        .retry(fast_retry())
        .build();

    let response = client.sample(&dockerfile_request()).await.unwrap();
    assert_eq!(backend.call_count(), 4);
    assert_eq!(response.attempts, 4);
    assert!(!response.from_cache);
    assert_eq!(response.model.as_deref(), Some("mock-model"));
}

#[tokio::test(start_paused = true)]
async fn always_failing_exhausts_retries() {
    let backend = Arc::new(FailThenSucceed::new(u32::MAX, || {
        DraupnirError::Network("connection reset".into())
    }));
    let client = SamplingClient::builder(backend.clone())
        .retry(fast_retry())
        .build();

    let err = client.sample(&dockerfile_request()).await.unwrap_err();
    assert_eq!(backend.call_count(), 4);
    match err {
        DraupnirError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 4);
            assert!(last_error.contains("connection reset"));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_is_linear() {
    let backend = Arc::new(FailThenSucceed::new(3, rate_limited));
    let client = SamplingClient::builder(backend)
        .retry(fast_retry())
        .build();

    let start = tokio::time::Instant::now();
    client.sample(&dockerfile_request()).await.unwrap();
    // 100ms * 1 + 100ms * 2 + 100ms * 3
    assert_eq!(start.elapsed(), Duration::from_millis(600));
}

#[tokio::test]
async fn permanent_error_is_not_retried() {
    let backend = Arc::new(FailThenSucceed::new(u32::MAX, || {
        DraupnirError::InvalidRequest("bad prompt".into())
    }));
    let client = SamplingClient::builder(backend.clone())
        .retry(fast_retry())
        .build();

    let err = client.sample(&dockerfile_request()).await.unwrap_err();
    assert_eq!(backend.call_count(), 1);
    assert!(matches!(err, DraupnirError::InvalidRequest(_)));
}

/// Backend that never answers within the timeout.
struct Hangs(AtomicU32);

#[async_trait]
impl SamplingBackend for Hangs {
    fn name(&self) -> &str {
        "hangs"
    }

    async fn invoke(&self, _: &RenderedPrompt, _: &InvokeParams) -> Result<BackendResponse> {
        self.0.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(BackendResponse::new("late"))
    }
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried() {
    let backend = Arc::new(Hangs(AtomicU32::new(0)));
    let client = SamplingClient::builder(backend.clone())
        .retry(fast_retry().retry_attempts(1).timeout(Duration::from_secs(2)))
        .build();

    let err = client.sample(&dockerfile_request()).await.unwrap_err();
    assert_eq!(backend.0.load(Ordering::Relaxed), 2);
    assert!(matches!(err, DraupnirError::RetriesExhausted { attempts: 2, .. }));
    assert!(err.to_string().contains("timed out"));
}

// =========================================================================
// Cancellation
// =========================================================================

/// Backend that cancels its caller's token and reports a transient error.
struct CancelsCaller {
    token: CancellationToken,
    calls: AtomicU32,
}

#[async_trait]
impl SamplingBackend for CancelsCaller {
    fn name(&self) -> &str {
        "cancels"
    }

    async fn invoke(&self, _: &RenderedPrompt, _: &InvokeParams) -> Result<BackendResponse> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.token.cancel();
        Err(rate_limited())
    }
}

#[tokio::test]
async fn cancellation_abandons_retries() {
    let token = CancellationToken::new();
    let backend = Arc::new(CancelsCaller {
        token: token.clone(),
        calls: AtomicU32::new(0),
    });
    let client = SamplingClient::builder(backend.clone())
        .retry(fast_retry().retry_delay(Duration::from_secs(3600)))
        .build();

    let started = std::time::Instant::now();
    let err = client
        .sample_cancellable(&dockerfile_request(), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(backend.calls.load(Ordering::Relaxed), 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancelled_before_start_never_invokes() {
    let backend = Arc::new(FailThenSucceed::ok("x"));
    let client = SamplingClient::builder(backend.clone()).build();
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .sample_cancellable(&dockerfile_request(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, DraupnirError::Cancelled));
    assert_eq!(backend.call_count(), 0);
}

// =========================================================================
// Templates
// =========================================================================

#[tokio::test]
async fn unknown_template_is_terminal() {
    let backend = Arc::new(FailThenSucceed::ok("x"));
    let client = SamplingClient::builder(backend.clone()).build();

    let err = client
        .sample(&GenerationRequest::new("no-such-template"))
        .await
        .unwrap_err();
    assert!(matches!(err, DraupnirError::TemplateNotFound(ref id) if id == "no-such-template"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn missing_variables_are_terminal() {
    let backend = Arc::new(FailThenSucceed::ok("x"));
    let client = SamplingClient::builder(backend.clone()).build();

    let err = client
        .sample(&GenerationRequest::new("dockerfile-generation"))
        .await
        .unwrap_err();
    match err {
        DraupnirError::MissingRequiredVariables {
            template_id,
            missing,
        } => {
            assert_eq!(template_id, "dockerfile-generation");
            assert_eq!(missing, ["app_name", "language"]);
        }
        other => panic!("expected MissingRequiredVariables, got {other:?}"),
    }
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn inserted_templates_take_precedence() {
    let store = Arc::new(TemplateStore::new());
    store
        .insert(
            Template::new("greeting", "2", "Hello {{name}}, it is ${_year}")
                .variable(VariableDecl::required("name")),
        )
        .await;
    let backend = Arc::new(Recording::default());
    let client = SamplingClient::builder(backend.clone())
        .templates(store)
        .build();

    client
        .sample(&GenerationRequest::new("greeting").var("name", "Ada"))
        .await
        .unwrap();
    let user = backend.last_user.lock().unwrap().clone().unwrap();
    assert!(user.starts_with("Hello Ada, it is 2"));
}

// =========================================================================
// Format validation
// =========================================================================

#[tokio::test]
async fn json_format_rejects_non_json() {
    let backend = Arc::new(FailThenSucceed::ok("this is not json"));
    let client = SamplingClient::builder(backend).build();

    let err = client
        .sample(&dockerfile_request().format(OutputFormat::Json))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not valid JSON"));
}

#[tokio::test]
async fn yaml_format_accepts_yaml() {
    let backend = Arc::new(FailThenSucceed::ok("apiVersion: v1\nkind: Service\n"));
    let client = SamplingClient::builder(backend).build();

    let response = client
        .sample(&dockerfile_request().format(OutputFormat::Yaml))
        .await
        .unwrap();
    assert!(response.content.starts_with("apiVersion"));
}

#[tokio::test]
async fn format_is_forwarded_to_backend() {
    let backend = Arc::new(Recording::default());
    let client = SamplingClient::builder(backend.clone()).build();
    client
        .sample(&dockerfile_request().format(OutputFormat::Text))
        .await
        .unwrap();
    assert_eq!(*backend.last_format.lock().unwrap(), Some(OutputFormat::Text));
}

// =========================================================================
// Cache integration
// =========================================================================

#[tokio::test]
async fn second_identical_call_is_a_cache_hit() {
    let backend = Arc::new(FailThenSucceed::ok("FROM alpine:3.20\n"));
    let cache = Arc::new(ResponseCache::new(CacheConfig::default()));
    let client = SamplingClient::builder(backend.clone())
        .cache(cache.clone())
        .build();

    let first = client.sample(&dockerfile_request()).await.unwrap();
    let second = client.sample(&dockerfile_request()).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.attempts, 0);
    assert_eq!(first.content, second.content);
    assert_eq!(second.usage, first.usage);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(client.metrics().cache_hits, 1);
}

#[tokio::test]
async fn failures_are_not_cached_by_default() {
    let backend = Arc::new(FailThenSucceed::new(1, || {
        DraupnirError::InvalidRequest("bad".into())
    }));
    let cache = Arc::new(ResponseCache::new(CacheConfig::default()));
    let client = SamplingClient::builder(backend.clone())
        .cache(cache.clone())
        .build();

    assert!(client.sample(&dockerfile_request()).await.is_err());
    assert!(client.sample(&dockerfile_request()).await.is_ok());
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn cached_failures_short_circuit() {
    let backend = Arc::new(FailThenSucceed::new(1, || {
        DraupnirError::InvalidRequest("bad".into())
    }));
    let cache = Arc::new(ResponseCache::new(CacheConfig::new().cache_failures(true)));
    let client = SamplingClient::builder(backend.clone())
        .cache(cache)
        .build();

    assert!(client.sample(&dockerfile_request()).await.is_err());
    let err = client.sample(&dockerfile_request()).await.unwrap_err();
    assert!(matches!(err, DraupnirError::CachedFailure(ref m) if m.contains("bad")));
    assert_eq!(backend.call_count(), 1);
}

// =========================================================================
// Metrics accessor
// =========================================================================

#[tokio::test]
async fn metrics_snapshot_and_reset() {
    let backend = Arc::new(FailThenSucceed::ok("x"));
    let client = SamplingClient::builder(backend).build();

    client.sample(&dockerfile_request()).await.unwrap();
    let _ = client.sample(&GenerationRequest::new("missing")).await;

    let m = client.metrics();
    assert_eq!(m.total_requests, 2);
    assert_eq!(m.total_errors, 1);
    assert_eq!(m.backend_invocations, 1);
    assert!(m.last_error.as_deref().unwrap().contains("missing"));
    assert_eq!(m.template_cache_size, 1);

    client.reset_metrics();
    let m = client.metrics();
    assert_eq!(m.total_requests, 0);
    assert!(m.last_error.is_none());
}

#[tokio::test]
async fn clear_cache_purges_templates_only() {
    let backend = Arc::new(FailThenSucceed::ok("x"));
    let cache = Arc::new(ResponseCache::new(CacheConfig::default()));
    let client = SamplingClient::builder(backend)
        .cache(cache.clone())
        .build();

    client.sample(&dockerfile_request()).await.unwrap();
    assert_eq!(client.templates().len(), 1);
    assert_eq!(cache.len(), 1);

    client.clear_cache().await;
    assert_eq!(client.metrics().template_cache_size, 0);
    assert_eq!(cache.len(), 1);
}
