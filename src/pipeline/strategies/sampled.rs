//! Strategy backed by a sampling template.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{Strategy, StrategyProfile};
use crate::Result;
use crate::cancel::CancellationToken;
use crate::sampling::SamplingClient;
use crate::structured::strip_code_fences;
use crate::types::{ArtifactContext, GenerationRequest};

/// Generates candidates by rendering a template and sampling the backend.
///
/// Context fields become template variables (`app_name`, `language`,
/// `language_version`, `framework`, `port`, `start_command`, `image`,
/// `replicas`), and every `extras` entry is passed through by name.
pub struct TemplateStrategy {
    name: String,
    template_id: String,
    client: Arc<SamplingClient>,
    profile: StrategyProfile,
    temperature: Option<f32>,
}

impl TemplateStrategy {
    pub fn new(
        name: impl Into<String>,
        template_id: impl Into<String>,
        client: Arc<SamplingClient>,
    ) -> Self {
        Self {
            name: name.into(),
            template_id: template_id.into(),
            client,
            profile: StrategyProfile::new(0.7, 0.8, 0.75),
            temperature: None,
        }
    }

    pub fn with_profile(mut self, profile: StrategyProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request(&self, ctx: &ArtifactContext) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.template_id.clone())
            .var("app_name", ctx.app_name.clone())
            .context("strategy", self.name.clone());
        if !ctx.language.is_empty() {
            request = request.var("language", ctx.language.clone());
        }
        let optional: [(&str, Option<Value>); 6] = [
            ("language_version", ctx.language_version.clone().map(Value::from)),
            ("framework", ctx.framework.clone().map(Value::from)),
            ("port", ctx.port.map(Value::from)),
            ("start_command", ctx.start_command.clone().map(Value::from)),
            ("image", ctx.image.clone().map(Value::from)),
            ("replicas", ctx.replicas.map(Value::from)),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                request = request.var(name, value);
            }
        }
        for (k, v) in &ctx.extras {
            request = request.var(k.clone(), v.clone());
        }
        if let Some(t) = self.temperature {
            request = request.temperature(t);
        }
        request
    }
}

#[async_trait]
impl Strategy for TemplateStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> StrategyProfile {
        self.profile
    }

    async fn generate(&self, ctx: &ArtifactContext, cancel: &CancellationToken) -> Result<String> {
        let response = self
            .client
            .sample_cancellable(&self.request(ctx), cancel)
            .await?;
        Ok(strip_code_fences(&response.content).to_string())
    }
}
