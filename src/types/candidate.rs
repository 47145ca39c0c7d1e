//! Candidate artifacts and their scored form.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of artifact a candidate represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    #[default]
    Dockerfile,
    KubernetesManifest,
}

/// Input to candidate generation: what the artifact is for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactContext {
    pub kind: ArtifactKind,
    /// Application name, used for image and resource names.
    pub app_name: String,
    /// Primary language (e.g. "python", "node", "go", "java", "rust").
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    /// Container image reference (manifests only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl ArtifactContext {
    /// Context for a Dockerfile.
    pub fn dockerfile(app_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Dockerfile, app_name, language)
    }

    /// Context for a Kubernetes manifest.
    pub fn manifest(app_name: impl Into<String>, image: impl Into<String>) -> Self {
        let mut ctx = Self::new(ArtifactKind::KubernetesManifest, app_name, "");
        ctx.image = Some(image.into());
        ctx
    }

    fn new(kind: ArtifactKind, app_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            kind,
            app_name: app_name.into(),
            language: language.into(),
            language_version: None,
            framework: None,
            port: None,
            start_command: None,
            image: None,
            replicas: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn language_version(mut self, version: impl Into<String>) -> Self {
        self.language_version = Some(version.into());
        self
    }

    pub fn framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn start_command(mut self, command: impl Into<String>) -> Self {
        self.start_command = Some(command.into());
        self
    }

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Canonical serialization used for candidate ids.
    pub fn canonical_json(&self) -> String {
        serde_json::to_value(self)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Static quality metadata attached by the producing strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    pub strategy: String,
    /// Strategy's self-assessed confidence, 0.0 to 1.0.
    pub confidence: f64,
    /// Relative cost estimate (build time, image size), 0.0 to 1.0.
    pub estimated_cost: f64,
    /// Relative quality estimate, 0.0 to 1.0.
    pub estimated_quality: f64,
}

/// One independently generated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub kind: ArtifactKind,
    pub content: String,
    pub metadata: CandidateMetadata,
    pub generated_at: DateTime<Utc>,
}

impl Candidate {
    /// Deterministic id for a (strategy, context) pair.
    pub fn derive_id(strategy: &str, ctx: &ArtifactContext) -> String {
        let mut hasher = Sha256::new();
        hasher.update(strategy.as_bytes());
        hasher.update([0u8]);
        hasher.update(ctx.canonical_json().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("{strategy}-{}", &digest[..16])
    }
}

/// A candidate with its score. Never mutates the source candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    /// Overall score, 0 to 100.
    pub score: f64,
    /// Per-criterion subscores, 0 to 100.
    pub breakdown: BTreeMap<String, f64>,
    /// 1-based rank within the scored set.
    pub rank: usize,
    pub rationale: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_id_is_stable() {
        let ctx = ArtifactContext::dockerfile("api", "python").port(8080);
        assert_eq!(
            Candidate::derive_id("security-first", &ctx),
            Candidate::derive_id("security-first", &ctx.clone())
        );
    }

    #[test]
    fn derive_id_depends_on_strategy_and_context() {
        let ctx = ArtifactContext::dockerfile("api", "python");
        let other = ArtifactContext::dockerfile("api", "node");
        let a = Candidate::derive_id("security-first", &ctx);
        assert!(a.starts_with("security-first-"));
        assert_ne!(a, Candidate::derive_id("size-optimized", &ctx));
        assert_ne!(a, Candidate::derive_id("security-first", &other));
    }
}
