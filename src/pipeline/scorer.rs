//! Deterministic candidate scoring.
//!
//! A [`Scorer`] produces independent 0-100 subscores per criterion; the
//! overall score is their weighted mean under [`ScoringWeights`]. Nothing
//! here is randomized, so identical content and weights always give the
//! identical score.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::artifact::{
    external_bases_pinned, final_user, from_image, is_non_root_user, is_pinned_image,
    parse_instructions,
};
use crate::types::{ArtifactKind, Candidate, ScoredCandidate};
use crate::{DraupnirError, Result};

/// Per-kind subscore producer.
pub trait Scorer: Send + Sync {
    /// Criterion names, in report order.
    fn criteria(&self) -> &'static [&'static str];

    /// Subscore per criterion, each clamped to 0-100.
    fn subscores(&self, content: &str) -> BTreeMap<String, f64>;
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn bonus(condition: bool, points: f64) -> f64 {
    if condition { points } else { 0.0 }
}

// ============================================================================
// Dockerfile
// ============================================================================

/// Scores Dockerfiles on security, performance, standards and maintainability.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerfileScorer;

impl DockerfileScorer {
    pub const CRITERIA: &'static [&'static str] =
        &["security", "performance", "standards", "maintainability"];
}

impl Scorer for DockerfileScorer {
    fn criteria(&self) -> &'static [&'static str] {
        Self::CRITERIA
    }

    fn subscores(&self, content: &str) -> BTreeMap<String, f64> {
        let ins = parse_instructions(content);
        let count = |kw: &str| ins.iter().filter(|i| i.keyword == kw).count();
        let any = |kw: &str, needle: &str| {
            ins.iter()
                .any(|i| i.keyword == kw && i.args.contains(needle))
        };

        let froms: Vec<&str> = ins
            .iter()
            .filter(|i| i.keyword == "FROM")
            .map(|i| from_image(&i.args))
            .collect();
        let external_pinned = external_bases_pinned(&ins);
        let final_base = froms.last().copied().unwrap_or("");
        let small_base = ["slim", "alpine", "distroless"]
            .iter()
            .any(|s| final_base.contains(s));
        let non_root = final_user(&ins).is_some_and(is_non_root_user);
        let secret_env = ins.iter().any(|i| {
            (i.keyword == "ENV" || i.keyword == "ARG")
                && ["PASSWORD", "SECRET", "TOKEN", "API_KEY"]
                    .iter()
                    .any(|s| i.args.to_ascii_uppercase().contains(s))
        });
        let remote_add = ins
            .iter()
            .any(|i| i.keyword == "ADD" && i.args.contains("://"));

        let security = 30.0
            + bonus(non_root, 30.0)
            + bonus(external_pinned, 20.0)
            + bonus(small_base, 10.0)
            + bonus(any("COPY", "--chown"), 10.0)
            - bonus(secret_env, 30.0)
            - bonus(remote_add, 15.0);

        let copy_all = ins
            .iter()
            .position(|i| i.keyword == "COPY" && i.args.ends_with(". ."));
        let deps_first = match copy_all {
            Some(at) => ins[..at]
                .iter()
                .any(|i| i.keyword == "COPY" && !i.args.ends_with(". .")),
            None => false,
        };
        let lean_install = ["--no-cache-dir", "npm ci", "rm -rf /var/lib/apt/lists", "--no-cache"]
            .iter()
            .any(|s| any("RUN", s));
        let performance = 30.0
            + bonus(froms.len() > 1, 25.0)
            + bonus(deps_first, 20.0)
            + bonus(any("RUN", "--mount=type=cache"), 15.0)
            + bonus(lean_install, 10.0);

        let exec_form = ins
            .iter()
            .filter(|i| i.keyword == "CMD" || i.keyword == "ENTRYPOINT")
            .any(|i| i.args.starts_with('['));
        let standards = 30.0
            + bonus(exec_form, 25.0)
            + bonus(count("WORKDIR") > 0, 15.0)
            + bonus(count("EXPOSE") > 0, 15.0)
            + bonus(!froms.iter().any(|f| f.ends_with(":latest")), 15.0);

        let documented = content.lines().any(|l| l.trim_start().starts_with('#'));
        let maintainability = 50.0
            + bonus(documented, 15.0)
            + bonus(ins.len() <= 30, 15.0)
            + bonus(count("RUN") <= 6, 10.0)
            + bonus(count("LABEL") > 0, 10.0);

        [
            ("security", security),
            ("performance", performance),
            ("standards", standards),
            ("maintainability", maintainability),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), round2(clamp(v))))
        .collect()
    }
}

// ============================================================================
// Kubernetes manifest
// ============================================================================

/// Scores manifests on security, reliability, standards and maintainability.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestScorer;

impl ManifestScorer {
    pub const CRITERIA: &'static [&'static str] =
        &["security", "reliability", "standards", "maintainability"];
}

impl Scorer for ManifestScorer {
    fn criteria(&self) -> &'static [&'static str] {
        Self::CRITERIA
    }

    fn subscores(&self, content: &str) -> BTreeMap<String, f64> {
        let has = |needle: &str| content.contains(needle);
        let replicas = content
            .lines()
            .filter_map(|l| l.trim().strip_prefix("replicas:"))
            .filter_map(|v| v.trim().parse::<u32>().ok())
            .max()
            .unwrap_or(1);
        let documents = content
            .lines()
            .filter(|l| l.trim_start().starts_with("kind:"))
            .count();
        let latest_image = content
            .lines()
            .filter_map(|l| l.trim().strip_prefix("image:"))
            .any(|image| {
                let image = image.trim().trim_matches('"');
                !is_pinned_image(image)
            });

        let security = 30.0
            + bonus(has("runAsNonRoot: true"), 25.0)
            + bonus(has("allowPrivilegeEscalation: false"), 15.0)
            + bonus(has("readOnlyRootFilesystem: true"), 10.0)
            + bonus(has("- ALL"), 10.0)
            + bonus(has("seccompProfile"), 5.0)
            + bonus(has("automountServiceAccountToken: false"), 5.0)
            - bonus(latest_image, 20.0)
            - bonus(has("privileged: true"), 30.0);

        let reliability = 10.0
            + bonus(has("readinessProbe"), 25.0)
            + bonus(has("livenessProbe"), 20.0)
            + bonus(replicas >= 2, 15.0)
            + bonus(has("limits:"), 15.0)
            + bonus(has("PodDisruptionBudget"), 10.0)
            + bonus(has("RollingUpdate"), 5.0);

        let standards = 30.0
            + bonus(has("app.kubernetes.io/name"), 20.0)
            + bonus(has("kind: Service"), 20.0)
            + bonus(has("requests:"), 20.0)
            + bonus(has("name: http"), 10.0);

        let maintainability = 60.0
            + bonus(documents <= 4, 20.0)
            + bonus(has("labels:"), 10.0)
            + bonus(content.lines().count() <= 150, 10.0);

        [
            ("security", security),
            ("reliability", reliability),
            ("standards", standards),
            ("maintainability", maintainability),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), round2(clamp(v))))
        .collect()
    }
}

// ============================================================================
// Weights
// ============================================================================

/// Relative criterion weights.
///
/// Weights need not sum to 1; they are normalized over the criteria a
/// scorer reports. Criteria without a weight count as 0. If every relevant
/// weight is 0 the criteria are weighted equally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    weights: BTreeMap<String, f64>,
}

impl ScoringWeights {
    /// Equal weights for every criterion.
    pub fn equal() -> Self {
        Self::default()
    }

    /// Build from `(criterion, weight)` pairs. Negative or non-finite
    /// weights are rejected.
    pub fn new<K: Into<String>>(weights: impl IntoIterator<Item = (K, f64)>) -> Result<Self> {
        let mut out = BTreeMap::new();
        for (k, w) in weights {
            let k = k.into();
            if !w.is_finite() || w < 0.0 {
                return Err(DraupnirError::InvalidInput(format!(
                    "weight for {k} must be a non-negative number, got {w}"
                )));
            }
            out.insert(k, w);
        }
        Ok(Self { weights: out })
    }

    /// Normalized weights over `criteria`, summing to 1.
    pub fn normalized(&self, criteria: &[&str]) -> BTreeMap<String, f64> {
        if criteria.is_empty() {
            return BTreeMap::new();
        }
        let raw: Vec<f64> = if self.weights.is_empty() {
            vec![1.0; criteria.len()]
        } else {
            criteria
                .iter()
                .map(|c| self.weights.get(*c).copied().unwrap_or(0.0))
                .collect()
        };
        let total: f64 = raw.iter().sum();
        criteria
            .iter()
            .zip(raw)
            .map(|(c, w)| {
                let w = if total > 0.0 {
                    w / total
                } else {
                    1.0 / criteria.len() as f64
                };
                (c.to_string(), w)
            })
            .collect()
    }
}

// ============================================================================
// Candidate scorer
// ============================================================================

/// Scores and ranks candidates with per-kind scorers and shared weights.
pub struct CandidateScorer {
    dockerfile: Arc<dyn Scorer>,
    manifest: Arc<dyn Scorer>,
    weights: RwLock<ScoringWeights>,
}

impl Default for CandidateScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateScorer {
    pub fn new() -> Self {
        Self {
            dockerfile: Arc::new(DockerfileScorer),
            manifest: Arc::new(ManifestScorer),
            weights: RwLock::new(ScoringWeights::equal()),
        }
    }

    /// Replace the scorer used for `kind`.
    pub fn with_scorer(mut self, kind: ArtifactKind, scorer: Arc<dyn Scorer>) -> Self {
        match kind {
            ArtifactKind::Dockerfile => self.dockerfile = scorer,
            ArtifactKind::KubernetesManifest => self.manifest = scorer,
        }
        self
    }

    pub fn with_weights(self, weights: ScoringWeights) -> Self {
        self.set_weights(weights);
        self
    }

    /// Replace the weights; later `score` calls use them.
    pub fn set_weights(&self, weights: ScoringWeights) {
        *self.weights.write().unwrap_or_else(PoisonError::into_inner) = weights;
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn scorer(&self, kind: ArtifactKind) -> &dyn Scorer {
        match kind {
            ArtifactKind::Dockerfile => self.dockerfile.as_ref(),
            ArtifactKind::KubernetesManifest => self.manifest.as_ref(),
        }
    }

    /// Score one candidate. Rank is left at 0.
    pub fn score_one(&self, candidate: &Candidate) -> ScoredCandidate {
        let scorer = self.scorer(candidate.kind);
        let breakdown = scorer.subscores(&candidate.content);
        let weights = self.weights().normalized(scorer.criteria());
        let total: f64 = weights
            .iter()
            .map(|(c, w)| w * breakdown.get(c).copied().unwrap_or(0.0))
            .sum();
        let score = round2(clamp(total));

        ScoredCandidate {
            rationale: rationale(scorer.criteria(), &breakdown, score),
            candidate: candidate.clone(),
            score,
            breakdown,
            rank: 0,
        }
    }

    /// Score every candidate, in input order, with 1-based ranks assigned by
    /// descending score (ties: earlier `generated_at`, then input order).
    pub fn score(&self, candidates: &[Candidate]) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates.iter().map(|c| self.score_one(c)).collect();
        for (rank, index) in ranking(&scored).into_iter().enumerate() {
            scored[index].rank = rank + 1;
        }
        scored
    }
}

/// Indices of `scored` ordered best first.
pub(crate) fn ranking(scored: &[ScoredCandidate]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scored.len()).collect();
    order.sort_by(|&a, &b| {
        scored[b]
            .score
            .total_cmp(&scored[a].score)
            .then_with(|| {
                scored[a]
                    .candidate
                    .generated_at
                    .cmp(&scored[b].candidate.generated_at)
            })
            .then_with(|| a.cmp(&b))
    });
    order
}

fn rationale(criteria: &[&str], breakdown: &BTreeMap<String, f64>, score: f64) -> String {
    let parts: Vec<String> = criteria
        .iter()
        .filter_map(|c| breakdown.get(*c).map(|s| format!("{c} {s}")))
        .collect();
    let best = criteria
        .iter()
        .filter_map(|c| breakdown.get(*c).map(|s| (*c, *s)))
        .fold(None::<(&str, f64)>, |acc, (c, s)| match acc {
            Some((_, best)) if best >= s => acc,
            _ => Some((c, s)),
        });
    let worst = criteria
        .iter()
        .filter_map(|c| breakdown.get(*c).map(|s| (*c, *s)))
        .fold(None::<(&str, f64)>, |acc, (c, s)| match acc {
            Some((_, worst)) if worst <= s => acc,
            _ => Some((c, s)),
        });
    match (best, worst) {
        (Some((best, _)), Some((worst, _))) => format!(
            "overall {score} ({}); strongest: {best}, weakest: {worst}",
            parts.join(", ")
        ),
        _ => format!("overall {score}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weights_fall_back_to_equal() {
        let w = ScoringWeights::new([("security", 0.0), ("performance", 0.0)]).unwrap();
        let n = w.normalized(DockerfileScorer::CRITERIA);
        assert!(n.values().all(|v| (*v - 0.25).abs() < 1e-9));
    }

    #[test]
    fn weights_are_normalized() {
        let w = ScoringWeights::new([("security", 3.0), ("performance", 1.0)]).unwrap();
        let n = w.normalized(DockerfileScorer::CRITERIA);
        assert!((n["security"] - 0.75).abs() < 1e-9);
        assert!((n["performance"] - 0.25).abs() < 1e-9);
        assert_eq!(n["standards"], 0.0);
    }

    #[test]
    fn negative_weights_are_rejected() {
        assert!(ScoringWeights::new([("security", -1.0)]).is_err());
        assert!(ScoringWeights::new([("security", f64::NAN)]).is_err());
    }

    #[test]
    fn hardened_dockerfile_scores_higher_on_security() {
        let hardened = "FROM python:3.12-slim\nWORKDIR /app\nCOPY --chown=app:app . .\nUSER app\nCMD [\"python\"]\n";
        let loose = "FROM python:latest\nENV API_KEY=abc\nCOPY . .\nCMD python app.py\n";
        let a = DockerfileScorer.subscores(hardened);
        let b = DockerfileScorer.subscores(loose);
        assert!(a["security"] > b["security"]);
        assert!(a["standards"] > b["standards"]);
    }

    #[test]
    fn stage_aliases_do_not_count_as_unpinned() {
        let df = "FROM golang:1.22 AS build\nFROM build AS test\nFROM alpine:3.20\n";
        let alias = DockerfileScorer.subscores(df)["security"];
        let unpinned = DockerfileScorer.subscores("FROM golang:1.22 AS build\nFROM other\nFROM alpine:3.20\n")["security"];
        assert!(alias > unpinned);
    }

    #[test]
    fn rationale_names_extremes() {
        let mut b = BTreeMap::new();
        b.insert("security".to_string(), 90.0);
        b.insert("performance".to_string(), 40.0);
        let r = rationale(&["security", "performance"], &b, 65.0);
        assert!(r.contains("strongest: security"));
        assert!(r.contains("weakest: performance"));
    }
}
