//! Rendered prompts, backend responses and sampling results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::OutputFormat;

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Metadata recorded while rendering a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub template_id: String,
    pub template_version: String,
    pub rendered_at: DateTime<Utc>,
    /// Variables that resolved to a value (explicit or default).
    pub resolved: Vec<String>,
    /// Required variables left unresolved (non-strict mode only).
    pub missing: Vec<String>,
    pub example_count: usize,
}

/// Output of the template renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    pub metadata: RenderMetadata,
}

/// Parameters forwarded to the backend alongside the rendered prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeParams {
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub format: OutputFormat,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

/// Raw backend response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl BackendResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Successful result of [`SamplingClient::sample`](crate::SamplingClient::sample)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub template_id: String,
    /// Served from the response cache without invoking the backend.
    pub from_cache: bool,
    /// Backend invocations made for this call (0 on a cache hit).
    pub attempts: u32,
}
