//! Candidate generation strategies.
//!
//! A strategy is a named function from an [`ArtifactContext`] to artifact
//! text, with static quality metadata. The built-in strategies are pure;
//! [`TemplateStrategy`] goes through a [`SamplingClient`](crate::SamplingClient).

mod dockerfile;
mod manifest;
mod sampled;

pub use dockerfile::{PerformanceOptimizedStrategy, SecurityFirstStrategy, SizeOptimizedStrategy};
pub use manifest::{MinimalManifestStrategy, ProductionManifestStrategy};
pub use sampled::TemplateStrategy;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::cancel::CancellationToken;
use crate::types::{ArtifactContext, ArtifactKind, CandidateMetadata};

/// Static self-assessment a strategy attaches to every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    pub confidence: f64,
    pub estimated_cost: f64,
    pub estimated_quality: f64,
}

impl StrategyProfile {
    pub const fn new(confidence: f64, estimated_cost: f64, estimated_quality: f64) -> Self {
        Self {
            confidence,
            estimated_cost,
            estimated_quality,
        }
    }

    pub(crate) fn metadata(&self, strategy: &str) -> CandidateMetadata {
        CandidateMetadata {
            strategy: strategy.to_string(),
            confidence: self.confidence,
            estimated_cost: self.estimated_cost,
            estimated_quality: self.estimated_quality,
        }
    }
}

/// One way of producing a candidate artifact.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable strategy name, part of the candidate id.
    fn name(&self) -> &str;

    fn profile(&self) -> StrategyProfile;

    /// Produce artifact text for `ctx`.
    ///
    /// Long-running strategies should observe `cancel`.
    async fn generate(&self, ctx: &ArtifactContext, cancel: &CancellationToken) -> Result<String>;
}

/// Built-in strategies for `kind`, in their fixed run order.
pub fn builtin_strategies(kind: ArtifactKind) -> Vec<Arc<dyn Strategy>> {
    match kind {
        ArtifactKind::Dockerfile => vec![
            Arc::new(SecurityFirstStrategy),
            Arc::new(PerformanceOptimizedStrategy),
            Arc::new(SizeOptimizedStrategy),
        ],
        ArtifactKind::KubernetesManifest => vec![
            Arc::new(ProductionManifestStrategy),
            Arc::new(MinimalManifestStrategy),
        ],
    }
}
