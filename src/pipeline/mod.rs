//! Candidate pipeline: generate, score, select.
//!
//! ```text
//! ArtifactContext ─► CandidateGenerator ─► CandidateScorer ─► SelectionPolicy ─► winner
//!                    (strategies, in order)   (weighted subscores)
//! ```
//!
//! With deterministic strategies and scorer, repeated runs on the same
//! context produce the same winner.

pub mod artifact;
mod generator;
mod scorer;
mod selector;
pub mod strategies;

pub use self::artifact::validate_artifact;
pub use self::generator::CandidateGenerator;
pub use self::scorer::{CandidateScorer, DockerfileScorer, ManifestScorer, Scorer, ScoringWeights};
pub use self::selector::{SelectionPolicy, select, select_top};
pub use self::strategies::{Strategy, StrategyProfile, TemplateStrategy, builtin_strategies};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::Result;
use crate::cancel::CancellationToken;
use crate::providers::ProgressNotifier;
use crate::types::{ArtifactContext, ArtifactKind, ScoredCandidate};

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub winner: ScoredCandidate,
    /// Every scored candidate, best first.
    pub ranked: Vec<ScoredCandidate>,
}

/// Generator, scorer and selection policy wired together.
pub struct CandidatePipeline {
    generator: CandidateGenerator,
    scorer: CandidateScorer,
    policy: SelectionPolicy,
}

impl CandidatePipeline {
    pub fn new(generator: CandidateGenerator, scorer: CandidateScorer) -> Self {
        Self {
            generator,
            scorer,
            policy: SelectionPolicy::default(),
        }
    }

    /// Pipeline over the built-in strategies and scorers for `kind`.
    pub fn for_kind(kind: ArtifactKind) -> Self {
        Self::new(CandidateGenerator::for_kind(kind), CandidateScorer::new())
    }

    pub fn policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ProgressNotifier>) -> Self {
        self.generator = self.generator.notifier(notifier);
        self
    }

    pub fn generator(&self) -> &CandidateGenerator {
        &self.generator
    }

    /// Scorer; its weights can be changed between runs.
    pub fn scorer(&self) -> &CandidateScorer {
        &self.scorer
    }

    /// Generate up to `count` candidates, score them and pick a winner.
    #[instrument(skip(self, ctx, cancel), fields(app = %ctx.app_name))]
    pub async fn run(
        &self,
        ctx: &ArtifactContext,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        let candidates = self.generator.generate(ctx, count, cancel).await?;
        let scored = self.scorer.score(&candidates);
        let winner = self.policy.select(&scored)?;
        let ranked = self.policy.select_top(&scored, scored.len());
        debug!(winner = %winner.candidate.id, score = winner.score, candidates = ranked.len());
        Ok(PipelineOutcome { winner, ranked })
    }
}
