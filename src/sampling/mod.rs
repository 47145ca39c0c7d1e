//! Sampling client: render, cache, invoke with retry, validate, store.
//!
//! A call moves through fixed stages, each a separate method with typed
//! input and output:
//!
//! ```text
//! Rendering ─► CacheLookup ─┬─► hit ──────────────────────────► Done
//!                           └─► Invoking (+ retries) ─► FormatValidating ─► CacheStore ─► Done
//! any stage ─► Failed
//! ```
//!
//! Template and variable errors are terminal and never reach the backend.
//! Backend errors are retried only when transient (see
//! [`with_retry()`](crate::providers::with_retry)).

mod counters;

pub use self::counters::SamplingMetrics;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use self::counters::ClientCounters;
use crate::cache::{CachedResponse, ResponseCache};
use crate::cancel::CancellationToken;
use crate::providers::{Retried, RetryConfig, SamplingBackend, with_retry};
use crate::telemetry;
use crate::template::{RenderOptions, TemplateRenderer, TemplateStore};
use crate::types::{
    BackendResponse, GenerationRequest, InvokeParams, OutputFormat, RenderedPrompt,
    SampleResponse,
};
use crate::{DraupnirError, Result};

/// Stage of a sampling call, recorded in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStage {
    Rendering,
    CacheLookup,
    Invoking,
    FormatValidating,
    CacheStore,
    Done,
    Failed,
}

/// Configuration for [`SamplingClient`].
#[derive(Debug, Clone, Default)]
pub struct SamplingConfig {
    pub retry: RetryConfig,
    pub render: RenderOptions,
}

impl SamplingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn render(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }
}

/// Builder for [`SamplingClient`].
pub struct SamplingClientBuilder {
    backend: Arc<dyn SamplingBackend>,
    templates: Option<Arc<TemplateStore>>,
    cache: Option<Arc<ResponseCache>>,
    config: SamplingConfig,
}

impl SamplingClientBuilder {
    /// Use a shared template store instead of a private built-ins-only one.
    pub fn templates(mut self, store: Arc<TemplateStore>) -> Self {
        self.templates = Some(store);
        self
    }

    /// Enable response caching through `cache`.
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: SamplingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn render_options(mut self, render: RenderOptions) -> Self {
        self.config.render = render;
        self
    }

    pub fn build(self) -> SamplingClient {
        SamplingClient {
            backend: self.backend,
            templates: self
                .templates
                .unwrap_or_else(|| Arc::new(TemplateStore::new())),
            cache: self.cache,
            renderer: TemplateRenderer::new(self.config.render),
            retry: self.config.retry,
            counters: ClientCounters::default(),
        }
    }
}

/// Resilient sampling front-end over a [`SamplingBackend`].
pub struct SamplingClient {
    backend: Arc<dyn SamplingBackend>,
    templates: Arc<TemplateStore>,
    cache: Option<Arc<ResponseCache>>,
    renderer: TemplateRenderer,
    retry: RetryConfig,
    counters: ClientCounters,
}

impl SamplingClient {
    pub fn builder(backend: Arc<dyn SamplingBackend>) -> SamplingClientBuilder {
        SamplingClientBuilder {
            backend,
            templates: None,
            cache: None,
            config: SamplingConfig::default(),
        }
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Sample without external cancellation.
    pub async fn sample(&self, request: &GenerationRequest) -> Result<SampleResponse> {
        self.sample_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Sample, abandoning retries once `cancel` fires.
    #[instrument(skip(self, request, cancel), fields(template = %request.template_id))]
    pub async fn sample_cancellable(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<SampleResponse> {
        let start = Instant::now();
        self.counters.record_request();

        let result = self.run_stages(request, cancel).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::SAMPLE_REQUESTS_TOTAL,
            "template" => request.template_id.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::SAMPLE_DURATION_SECONDS,
            "template" => request.template_id.clone(),
        )
        .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(response) => {
                if response.from_cache {
                    self.counters.record_cache_hit();
                }
                debug!(stage = ?SampleStage::Done, from_cache = response.from_cache, attempts = response.attempts);
            }
            Err(e) => {
                self.counters.record_error(e);
                warn!(stage = ?SampleStage::Failed, error = %e, "sampling failed");
            }
        }
        result
    }

    async fn run_stages(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<SampleResponse> {
        cancel.check()?;
        let (keyed, prompt) = self.render_stage(request).await?;

        if let Some(hit) = self.lookup_stage(&keyed)? {
            return Ok(hit);
        }

        let outcome = match self.invoke_stage(&keyed, &prompt, cancel).await {
            Ok(retried) => validate_format(keyed.format, &retried.value.content).map(|()| {
                SampleResponse {
                    content: retried.value.content,
                    model: retried.value.model,
                    usage: retried.value.usage,
                    template_id: keyed.template_id.clone(),
                    from_cache: false,
                    attempts: retried.attempts,
                }
            }),
            Err(e) => Err(e),
        };

        self.store_stage(&keyed, &outcome);
        outcome
    }

    /// Resolve the template and render it.
    ///
    /// Returns the request stamped with the template version (the cache
    /// key) alongside the rendered prompt.
    pub(crate) async fn render_stage(
        &self,
        request: &GenerationRequest,
    ) -> Result<(GenerationRequest, RenderedPrompt)> {
        debug!(stage = ?SampleStage::Rendering);
        let template = self.templates.get(&request.template_id).await?;
        let prompt = self.renderer.render(&template, &request.variables)?;
        let mut keyed = request.clone();
        keyed.template_version = Some(template.version.clone());
        Ok((keyed, prompt))
    }

    /// Consult the response cache.
    ///
    /// A cached failure is returned as `CachedFailure`.
    pub(crate) fn lookup_stage(&self, keyed: &GenerationRequest) -> Result<Option<SampleResponse>> {
        debug!(stage = ?SampleStage::CacheLookup);
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        match cache.get(keyed) {
            Some(cached) if cached.success => Ok(Some(SampleResponse {
                content: cached.content,
                model: cached.model,
                usage: cached.usage,
                template_id: keyed.template_id.clone(),
                from_cache: true,
                attempts: 0,
            })),
            Some(cached) => Err(DraupnirError::CachedFailure(cached.content)),
            None => Ok(None),
        }
    }

    /// Invoke the backend under the retry policy.
    pub(crate) async fn invoke_stage(
        &self,
        keyed: &GenerationRequest,
        prompt: &RenderedPrompt,
        cancel: &CancellationToken,
    ) -> Result<Retried<BackendResponse>> {
        debug!(stage = ?SampleStage::Invoking, backend = self.backend.name());
        let params = InvokeParams {
            max_tokens: keyed.max_tokens,
            temperature: keyed.temperature,
            model: keyed.model.clone(),
            format: keyed.format,
            context: keyed.context.clone(),
        };
        let params = &params;
        let backend = &self.backend;
        let counters = &self.counters;
        let retried = with_retry(&self.retry, cancel, backend.name(), || {
            counters.record_invocation();
            backend.invoke(prompt, params)
        })
        .await?;

        if let Some(usage) = &retried.value.usage {
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "backend" => backend.name().to_owned(),
                "direction" => "prompt",
            )
            .increment(u64::from(usage.prompt_tokens));
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "backend" => backend.name().to_owned(),
                "direction" => "completion",
            )
            .increment(u64::from(usage.completion_tokens));
        }
        Ok(retried)
    }

    /// Write the outcome to the response cache.
    ///
    /// Cancellations are never cached; other failures are offered to the
    /// cache, which drops them unless failure caching is enabled.
    pub(crate) fn store_stage(&self, keyed: &GenerationRequest, outcome: &Result<SampleResponse>) {
        let Some(cache) = &self.cache else {
            return;
        };
        debug!(stage = ?SampleStage::CacheStore);
        let value = match outcome {
            Ok(response) => CachedResponse::success(response.content.clone())
                .with_model(response.model.clone())
                .with_usage(response.usage.clone()),
            Err(DraupnirError::Cancelled) => return,
            Err(e) => CachedResponse::failure(e.to_string()),
        };
        cache.set(keyed, value);
    }

    /// Read-only snapshot of this client's counters.
    pub fn metrics(&self) -> SamplingMetrics {
        self.counters.snapshot(self.templates.len())
    }

    /// Reset this client's counters.
    pub fn reset_metrics(&self) {
        self.counters.reset();
    }

    /// Drop loaded templates. The response cache is left untouched.
    pub async fn clear_cache(&self) {
        self.templates.clear().await;
    }
}

/// Check that `content` parses as `format`. `Text` always passes.
pub fn validate_format(format: OutputFormat, content: &str) -> Result<()> {
    debug!(stage = ?SampleStage::FormatValidating, ?format);
    let message = match format {
        OutputFormat::Text => return Ok(()),
        OutputFormat::Json => serde_json::from_str::<serde_json::Value>(content.trim())
            .err()
            .map(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::from_str::<serde_yaml::Value>(content)
            .err()
            .map(|e| e.to_string()),
    };
    match message {
        None => Ok(()),
        Some(message) => Err(DraupnirError::FormatValidation { format, message }),
    }
}
