//! Winner selection over scored candidates.

use serde::{Deserialize, Serialize};

use super::scorer::ranking;
use crate::types::ScoredCandidate;
use crate::{DraupnirError, Result};

/// How the winner is picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Maximum score; ties go to the earliest generated candidate.
    #[default]
    HighestScore,
    /// Maximum strategy confidence, then score, then generation order.
    HighestConfidence,
}

impl SelectionPolicy {
    /// Candidate indices ordered best first under this policy.
    fn order(self, scored: &[ScoredCandidate]) -> Vec<usize> {
        match self {
            Self::HighestScore => ranking(scored),
            Self::HighestConfidence => {
                let mut order: Vec<usize> = (0..scored.len()).collect();
                order.sort_by(|&a, &b| {
                    let (x, y) = (&scored[a], &scored[b]);
                    y.candidate
                        .metadata
                        .confidence
                        .total_cmp(&x.candidate.metadata.confidence)
                        .then_with(|| y.score.total_cmp(&x.score))
                        .then_with(|| x.candidate.generated_at.cmp(&y.candidate.generated_at))
                        .then(a.cmp(&b))
                });
                order
            }
        }
    }

    /// Pick the winner. Empty input is `NoCandidatesGenerated`.
    pub fn select(self, scored: &[ScoredCandidate]) -> Result<ScoredCandidate> {
        self.order(scored)
            .first()
            .map(|&i| scored[i].clone())
            .ok_or(DraupnirError::NoCandidatesGenerated)
    }

    /// Up to `k` best candidates, best first.
    pub fn select_top(self, scored: &[ScoredCandidate], k: usize) -> Vec<ScoredCandidate> {
        self.order(scored)
            .into_iter()
            .take(k)
            .map(|i| scored[i].clone())
            .collect()
    }
}

/// Highest-score winner.
pub fn select(scored: &[ScoredCandidate]) -> Result<ScoredCandidate> {
    SelectionPolicy::HighestScore.select(scored)
}

/// Top `k` by descending score.
pub fn select_top(scored: &[ScoredCandidate], k: usize) -> Vec<ScoredCandidate> {
    SelectionPolicy::HighestScore.select_top(scored, k)
}
