//! Structured (JSON/YAML) sampling with repair and validation.
//!
//! Backend output is parsed as the requested format. Unparseable JSON goes
//! through up to `max_repair_attempts` cumulative [`RepairPass`]es. If it
//! still does not parse, strict mode fails with `FormatValidation`;
//! otherwise the schema's minimal default is returned and the outcome is
//! marked as a fallback. A value that parses but violates the schema is a
//! terminal `SchemaViolation` and is never repaired.

mod repair;
mod schema;

pub use self::repair::{RepairPass, strip_code_fences};
pub use self::schema::Schema;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cancel::CancellationToken;
use crate::sampling::SamplingClient;
use crate::telemetry;
use crate::types::{GenerationRequest, OutputFormat};
use crate::{DraupnirError, Result};

/// Repair policy for [`StructuredSampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredConfig {
    /// Repair passes tried after a parse failure. Default: 3.
    pub max_repair_attempts: u32,
    /// Fail instead of falling back to the schema default. Default: false.
    pub strict: bool,
}

impl Default for StructuredConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: RepairPass::ALL.len() as u32,
            strict: false,
        }
    }
}

impl StructuredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_repair_attempts(mut self, n: u32) -> Self {
        self.max_repair_attempts = n;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Parsed structured value and how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredOutput {
    pub value: Value,
    /// Repair passes applied before the value parsed.
    pub repairs: u32,
    /// True when `value` is the schema default rather than backend output.
    pub fallback: bool,
    pub from_cache: bool,
}

/// Structured front-end over a [`SamplingClient`].
pub struct StructuredSampler {
    client: Arc<SamplingClient>,
    config: StructuredConfig,
}

impl StructuredSampler {
    pub fn new(client: Arc<SamplingClient>) -> Self {
        Self {
            client,
            config: StructuredConfig::default(),
        }
    }

    pub fn config(mut self, config: StructuredConfig) -> Self {
        self.config = config;
        self
    }

    /// Sample and parse without external cancellation.
    pub async fn sample(
        &self,
        request: &GenerationRequest,
        schema: Option<&Schema>,
    ) -> Result<StructuredOutput> {
        self.sample_structured(request, schema, &CancellationToken::new())
            .await
    }

    /// Sample `request` and parse the response as JSON (or YAML when the
    /// request asks for it).
    ///
    /// Backend errors propagate unchanged; only parse failures degrade.
    #[instrument(skip(self, request, schema, cancel), fields(template = %request.template_id))]
    pub async fn sample_structured(
        &self,
        request: &GenerationRequest,
        schema: Option<&Schema>,
        cancel: &CancellationToken,
    ) -> Result<StructuredOutput> {
        let format = match request.format {
            OutputFormat::Yaml => OutputFormat::Yaml,
            _ => OutputFormat::Json,
        };
        // Parsing happens here, so the client must not reject the raw text.
        let raw_request = request.clone().format(OutputFormat::Text);
        let response = self.client.sample_cancellable(&raw_request, cancel).await?;

        let parsed = match format {
            OutputFormat::Yaml => parse_yaml(&response.content).map(|v| (v, 0)),
            _ => self.parse_json(&response.content),
        };

        let output = match parsed {
            Ok((value, repairs)) => StructuredOutput {
                value,
                repairs,
                fallback: false,
                from_cache: response.from_cache,
            },
            Err(message) => {
                if self.config.strict {
                    return Err(DraupnirError::FormatValidation { format, message });
                }
                warn!(%format, error = %message, "unparseable structured output, using default");
                StructuredOutput {
                    value: schema.map_or(Value::Object(Default::default()), Schema::default_value),
                    repairs: self.config.max_repair_attempts.min(RepairPass::ALL.len() as u32),
                    fallback: true,
                    from_cache: response.from_cache,
                }
            }
        };

        if let Some(schema) = schema {
            schema.validate(&output.value)?;
        }
        Ok(output)
    }

    /// Parse, repairing on failure. Returns the value and the passes used,
    /// or the last parse error message.
    fn parse_json(&self, content: &str) -> std::result::Result<(Value, u32), String> {
        let mut last_error = match serde_json::from_str::<Value>(content.trim()) {
            Ok(value) => return Ok((value, 0)),
            Err(e) => e.to_string(),
        };

        let mut text = content.to_string();
        let passes = RepairPass::ALL
            .iter()
            .take(self.config.max_repair_attempts as usize);
        for (attempt, pass) in passes.enumerate() {
            text = pass.apply(&text);
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => {
                    metrics::counter!(telemetry::REPAIRS_TOTAL, "status" => "ok").increment(1);
                    debug!(pass = pass.name(), attempts = attempt + 1, "repaired structured output");
                    return Ok((value, attempt as u32 + 1));
                }
                Err(e) => last_error = e.to_string(),
            }
        }
        if self.config.max_repair_attempts > 0 {
            metrics::counter!(telemetry::REPAIRS_TOTAL, "status" => "error").increment(1);
        }
        Err(last_error)
    }
}

/// Parse YAML (fences tolerated) into a JSON value.
fn parse_yaml(content: &str) -> std::result::Result<Value, String> {
    serde_yaml::from_str::<Value>(strip_code_fences(content)).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_becomes_json() {
        let v = parse_yaml("```yaml\nname: web\nports: [80, 443]\n```").unwrap();
        assert_eq!(v, serde_json::json!({"name": "web", "ports": [80, 443]}));
    }

    #[test]
    fn default_config_tries_every_pass() {
        assert_eq!(StructuredConfig::default().max_repair_attempts, 3);
        assert!(!StructuredConfig::default().strict);
    }
}
