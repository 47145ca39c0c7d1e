//! Draupnir - reliable sampling for AI-generated container artifacts
//!
//! This crate sits between an application and an opaque generation
//! backend. It renders prompts from versioned templates, caches responses,
//! retries transient backend failures, repairs structured output, and runs
//! a multi-strategy generate/score/select competition over Dockerfiles and
//! Kubernetes manifests.
//!
//! # Sampling Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use draupnir::{
//!     BackendResponse, CacheConfig, GenerationRequest, InvokeParams, RenderedPrompt,
//!     ResponseCache, SamplingBackend, SamplingClient,
//! };
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl SamplingBackend for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn invoke(
//!         &self,
//!         prompt: &RenderedPrompt,
//!         _params: &InvokeParams,
//!     ) -> draupnir::Result<BackendResponse> {
//!         Ok(BackendResponse::new(prompt.user.clone()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> draupnir::Result<()> {
//!     let client = SamplingClient::builder(Arc::new(Echo))
//!         .cache(Arc::new(ResponseCache::new(CacheConfig::default())))
//!         .build();
//!
//!     let response = client
//!         .sample(
//!             &GenerationRequest::new("dockerfile-generation")
//!                 .var("app_name", "api")
//!                 .var("language", "python"),
//!         )
//!         .await?;
//!
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```
//!
//! # Candidate Example
//!
//! ```rust,no_run
//! use draupnir::{ArtifactContext, ArtifactKind, CancellationToken, CandidatePipeline};
//!
//! # async fn run() -> draupnir::Result<()> {
//! let pipeline = CandidatePipeline::for_kind(ArtifactKind::Dockerfile);
//! let ctx = ArtifactContext::dockerfile("api", "go").port(8080);
//! let outcome = pipeline.run(&ctx, 3, &CancellationToken::new()).await?;
//! println!("{} scored {}", outcome.winner.candidate.id, outcome.winner.score);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod sampling;
pub mod structured;
pub mod telemetry;
pub mod template;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, CacheStats, CachedResponse, ResponseCache};
pub use cancel::CancellationToken;
pub use config::Config;
pub use error::{DraupnirError, Result};
pub use pipeline::{
    CandidateGenerator, CandidatePipeline, CandidateScorer, DockerfileScorer, ManifestScorer,
    PipelineOutcome, Scorer, ScoringWeights, SelectionPolicy, Strategy, StrategyProfile,
    TemplateStrategy, select, select_top,
};
pub use providers::{
    NoopNotifier, ProgressNotifier, Retried, RetryConfig, SamplingBackend, TemplateSource,
    TracingNotifier, classify_backend_message, with_retry,
};
pub use sampling::{SampleStage, SamplingClient, SamplingClientBuilder, SamplingConfig, SamplingMetrics};
pub use structured::{
    RepairPass, Schema, StructuredConfig, StructuredOutput, StructuredSampler, strip_code_fences,
};
pub use template::{DirectoryTemplateSource, RenderOptions, TemplateRenderer, TemplateStore};

// Re-export all types
pub use types::{
    ArtifactContext, ArtifactKind, BackendResponse, Candidate, CandidateMetadata,
    GenerationRequest, InvokeParams, OutputFormat, RenderMetadata, RenderedPrompt, SampleResponse,
    ScoredCandidate, Template, TemplateExample, TokenUsage, VariableDecl,
};
