//! Candidate generation across an ordered list of strategies.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::artifact::validate_artifact;
use super::strategies::{Strategy, builtin_strategies};
use crate::cancel::CancellationToken;
use crate::providers::{NoopNotifier, ProgressNotifier};
use crate::telemetry;
use crate::types::{ArtifactContext, ArtifactKind, Candidate};
use crate::{DraupnirError, Result};

/// Runs strategies in order and collects the candidates that succeed.
pub struct CandidateGenerator {
    strategies: Vec<Arc<dyn Strategy>>,
    notifier: Arc<dyn ProgressNotifier>,
}

impl CandidateGenerator {
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self {
            strategies,
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Generator over the built-in strategies for `kind`.
    pub fn for_kind(kind: ArtifactKind) -> Self {
        Self::new(builtin_strategies(kind))
    }

    pub fn notifier(mut self, notifier: Arc<dyn ProgressNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Strategy names in run order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Generate up to `count` candidates.
    pub async fn generate(
        &self,
        ctx: &ArtifactContext,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>> {
        let token = format!("generate:{}", ctx.app_name);
        self.generate_with_token(ctx, count, cancel, &token).await
    }

    /// Generate up to `count` candidates, reporting progress under `token`.
    ///
    /// Runs the first `min(count, strategies)` strategies in order. A
    /// strategy that fails, or whose output is not a structurally valid
    /// artifact, is skipped. Fails with `NoCandidatesGenerated` only when
    /// every strategy that ran was skipped. Cancellation is checked before
    /// each strategy and always propagates.
    #[instrument(skip(self, ctx, cancel), fields(app = %ctx.app_name, kind = ?ctx.kind))]
    pub async fn generate_with_token(
        &self,
        ctx: &ArtifactContext,
        count: usize,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<Vec<Candidate>> {
        if count == 0 {
            return Err(DraupnirError::InvalidInput(
                "candidate count must be at least 1".into(),
            ));
        }
        let total = count.min(self.strategies.len());
        let mut candidates = Vec::with_capacity(total);

        for (index, strategy) in self.strategies.iter().take(total).enumerate() {
            cancel.check()?;
            let name = strategy.name();

            let outcome = match strategy.generate(ctx, cancel).await {
                Ok(content) => validate_artifact(ctx.kind, &content).map(|()| content),
                Err(e) => Err(e),
            };
            let content = match outcome {
                Ok(content) => content,
                Err(DraupnirError::Cancelled) => return Err(DraupnirError::Cancelled),
                Err(e) => {
                    warn!(strategy = name, error = %e, "strategy failed, skipping");
                    metrics::counter!(telemetry::CANDIDATES_FAILED_TOTAL, "strategy" => name.to_owned())
                        .increment(1);
                    continue;
                }
            };

            candidates.push(Candidate {
                id: Candidate::derive_id(name, ctx),
                kind: ctx.kind,
                content,
                metadata: strategy.profile().metadata(name),
                generated_at: Utc::now(),
            });
            metrics::counter!(telemetry::CANDIDATES_GENERATED_TOTAL, "strategy" => name.to_owned())
                .increment(1);

            let percent = ((index + 1) * 100 / total) as u8;
            self.notifier
                .notify(token, percent, &format!("generated candidate {}/{total} ({name})", index + 1));
            debug!(strategy = name, percent, "candidate generated");
        }

        if candidates.is_empty() {
            return Err(DraupnirError::NoCandidatesGenerated);
        }
        Ok(candidates)
    }
}
