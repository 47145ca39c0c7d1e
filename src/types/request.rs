//! Generation request and its canonical fingerprint.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Structural format expected from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Free text; no structural check.
    #[default]
    Text,
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("JSON"),
            OutputFormat::Yaml => f.write_str("YAML"),
        }
    }
}

/// A request to render a template and sample the backend.
///
/// Maps are ordered, so two requests built with the same fields in a
/// different insertion order serialize identically and share a
/// [`fingerprint`](Self::fingerprint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Template to render.
    pub template_id: String,

    /// Template variables.
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,

    /// Expected response format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Model hint passed to the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Caller context (session id, tool name, ...). Part of the fingerprint.
    #[serde(default)]
    pub context: BTreeMap<String, Value>,

    /// Version of the resolved template.
    ///
    /// Filled in by the sampling client after template resolution so
    /// cache entries never leak across template versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_version: Option<String>,
}

impl GenerationRequest {
    /// Create a request for the given template with default parameters.
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            variables: BTreeMap::new(),
            format: OutputFormat::Text,
            max_tokens: 2048,
            temperature: 0.2,
            model: None,
            context: BTreeMap::new(),
            template_version: None,
        }
    }

    /// Set a template variable.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Set the expected output format.
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the model hint.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a context entry.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Canonical sorted-key JSON serialization of this request.
    pub fn canonical_json(&self) -> String {
        // serde_json's default map is ordered, so nested objects inside
        // variable values are sorted as well.
        match serde_json::to_value(self) {
            Ok(value) => value.to_string(),
            Err(_) => format!("{self:?}"),
        }
    }

    /// Cache key: SHA-256 of the canonical serialization, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
