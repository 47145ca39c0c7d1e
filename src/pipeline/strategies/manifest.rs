//! Deterministic Kubernetes manifest strategies.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Strategy, StrategyProfile};
use crate::cancel::CancellationToken;
use crate::types::ArtifactContext;
use crate::{DraupnirError, Result};

const DEFAULT_PORT: u16 = 8080;

fn image(ctx: &ArtifactContext) -> Result<&str> {
    ctx.image
        .as_deref()
        .ok_or_else(|| DraupnirError::InvalidInput("manifest context has no image".into()))
}

fn labels(ctx: &ArtifactContext) -> Value {
    json!({ "app.kubernetes.io/name": ctx.app_name })
}

fn service(ctx: &ArtifactContext, port: u16) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": ctx.app_name, "labels": labels(ctx) },
        "spec": {
            "selector": labels(ctx),
            "ports": [{ "name": "http", "port": 80, "targetPort": port }],
        },
    })
}

fn env(ctx: &ArtifactContext) -> Value {
    ctx.extras
        .iter()
        .map(|(k, v)| json!({ "name": k, "value": v }))
        .collect()
}

/// Serialize documents as one multi-document YAML stream.
fn to_yaml(documents: &[Value]) -> Result<String> {
    let mut parts = Vec::with_capacity(documents.len());
    for doc in documents {
        parts.push(serde_yaml::to_string(doc)?);
    }
    Ok(parts.join("---\n"))
}

// ============================================================================
// production-ready
// ============================================================================

/// Deployment with probes, resource bounds and a restricted security
/// context, plus a Service and a PodDisruptionBudget.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionManifestStrategy;

impl ProductionManifestStrategy {
    fn render(ctx: &ArtifactContext) -> Result<String> {
        let image = image(ctx)?;
        let port = ctx.port.unwrap_or(DEFAULT_PORT);
        let replicas = ctx.replicas.unwrap_or(2).max(2);

        let mut container = json!({
            "name": ctx.app_name,
            "image": image,
            "imagePullPolicy": "IfNotPresent",
            "ports": [{ "name": "http", "containerPort": port }],
            "resources": {
                "requests": { "cpu": "100m", "memory": "128Mi" },
                "limits": { "cpu": "500m", "memory": "512Mi" },
            },
            "readinessProbe": {
                "httpGet": { "path": "/", "port": "http" },
                "initialDelaySeconds": 5,
                "periodSeconds": 10,
            },
            "livenessProbe": {
                "httpGet": { "path": "/", "port": "http" },
                "initialDelaySeconds": 15,
                "periodSeconds": 20,
            },
            "securityContext": {
                "allowPrivilegeEscalation": false,
                "readOnlyRootFilesystem": true,
                "capabilities": { "drop": ["ALL"] },
            },
        });
        if !ctx.extras.is_empty() {
            container["env"] = env(ctx);
        }

        let deployment = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": ctx.app_name, "labels": labels(ctx) },
            "spec": {
                "replicas": replicas,
                "selector": { "matchLabels": labels(ctx) },
                "strategy": {
                    "type": "RollingUpdate",
                    "rollingUpdate": { "maxUnavailable": 0, "maxSurge": 1 },
                },
                "template": {
                    "metadata": { "labels": labels(ctx) },
                    "spec": {
                        "automountServiceAccountToken": false,
                        "securityContext": {
                            "runAsNonRoot": true,
                            "runAsUser": 10001,
                            "seccompProfile": { "type": "RuntimeDefault" },
                        },
                        "containers": [container],
                    },
                },
            },
        });

        let pdb = json!({
            "apiVersion": "policy/v1",
            "kind": "PodDisruptionBudget",
            "metadata": { "name": ctx.app_name, "labels": labels(ctx) },
            "spec": { "minAvailable": 1, "selector": { "matchLabels": labels(ctx) } },
        });

        to_yaml(&[deployment, service(ctx, port), pdb])
    }
}

#[async_trait]
impl Strategy for ProductionManifestStrategy {
    fn name(&self) -> &str {
        "production-ready"
    }

    fn profile(&self) -> StrategyProfile {
        StrategyProfile::new(0.9, 0.6, 0.9)
    }

    async fn generate(&self, ctx: &ArtifactContext, _cancel: &CancellationToken) -> Result<String> {
        Self::render(ctx)
    }
}

// ============================================================================
// minimal
// ============================================================================

/// Bare Deployment and Service.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalManifestStrategy;

impl MinimalManifestStrategy {
    fn render(ctx: &ArtifactContext) -> Result<String> {
        let image = image(ctx)?;
        let port = ctx.port.unwrap_or(DEFAULT_PORT);

        let mut container = json!({
            "name": ctx.app_name,
            "image": image,
            "ports": [{ "containerPort": port }],
        });
        if !ctx.extras.is_empty() {
            container["env"] = env(ctx);
        }

        let deployment = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": ctx.app_name },
            "spec": {
                "replicas": ctx.replicas.unwrap_or(1),
                "selector": { "matchLabels": labels(ctx) },
                "template": {
                    "metadata": { "labels": labels(ctx) },
                    "spec": { "containers": [container] },
                },
            },
        });

        to_yaml(&[deployment, service(ctx, port)])
    }
}

#[async_trait]
impl Strategy for MinimalManifestStrategy {
    fn name(&self) -> &str {
        "minimal"
    }

    fn profile(&self) -> StrategyProfile {
        StrategyProfile::new(0.7, 0.2, 0.6)
    }

    async fn generate(&self, ctx: &ArtifactContext, _cancel: &CancellationToken) -> Result<String> {
        Self::render(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::artifact::validate_manifest;

    #[test]
    fn both_strategies_produce_valid_manifests() {
        let ctx = ArtifactContext::manifest("web", "ghcr.io/acme/web:1.4.2")
            .port(3000)
            .extra("LOG_LEVEL", "info");
        for content in [
            ProductionManifestStrategy::render(&ctx).unwrap(),
            MinimalManifestStrategy::render(&ctx).unwrap(),
        ] {
            validate_manifest(&content).unwrap();
            assert!(content.contains("containerPort: 3000"));
            assert!(content.contains("LOG_LEVEL"));
        }
    }

    #[test]
    fn production_has_at_least_two_replicas() {
        let ctx = ArtifactContext::manifest("web", "web:1.0").replicas(1);
        let content = ProductionManifestStrategy::render(&ctx).unwrap();
        assert!(content.contains("replicas: 2"));
        assert!(content.contains("runAsNonRoot: true"));
        assert_eq!(content.matches("kind: ").count(), 3);
    }

    #[test]
    fn missing_image_is_an_error() {
        let mut ctx = ArtifactContext::manifest("web", "web:1.0");
        ctx.image = None;
        assert!(MinimalManifestStrategy::render(&ctx).is_err());
    }
}
