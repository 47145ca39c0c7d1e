//! File configuration.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. a `--config` flag)
//! 2. `~/.draupnir/config.toml` (user)
//! 3. `/etc/draupnir/config.toml` (system)
//!
//! Every section and field is optional; missing values take the runtime
//! defaults of [`RetryConfig`], [`CacheConfig`], [`RenderOptions`] and
//! [`StructuredConfig`]. Durations are in milliseconds.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::providers::RetryConfig;
use crate::sampling::SamplingConfig;
use crate::structured::StructuredConfig;
use crate::template::{DirectoryTemplateSource, RenderOptions, TemplateStore};
use crate::{DraupnirError, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub structured: StructuredConfig,
    #[serde(default)]
    pub templates: TemplatesSection,
}

/// `[sampling]`: retry policy and rendering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SamplingSection {
    /// Retries after the first invocation (default: 3).
    pub retry_attempts: Option<u32>,
    /// Base backoff in ms, multiplied by the retry number (default: 1000).
    pub retry_delay_ms: Option<u64>,
    /// Backoff cap in ms (default: 30000).
    pub max_delay_ms: Option<u64>,
    /// Per-invocation timeout in ms (default: 60000).
    pub timeout_ms: Option<u64>,
    /// Fail on missing required variables (default: true).
    pub strict_templates: Option<bool>,
    /// Append template examples to the user prompt (default: true).
    pub include_examples: Option<bool>,
}

/// `[cache]`: response cache policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSection {
    pub enabled: Option<bool>,
    /// Default TTL in ms (default: 900000).
    pub ttl_ms: Option<u64>,
    /// Entry limit (default: 1000).
    pub max_size: Option<usize>,
    /// Memory budget in bytes (default: 50 MiB).
    pub max_memory_bytes: Option<usize>,
    pub cache_failures: Option<bool>,
    /// Per-template TTL overrides in ms.
    #[serde(default)]
    pub template_ttls: HashMap<String, u64>,
}

/// `[templates]`: where to load templates from.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesSection {
    /// Directory of `<id>.yaml` / `<id>.json` templates.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Fall back to the built-in templates (default: true).
    #[serde(default = "default_true")]
    pub builtins: bool,
}

impl Default for TemplatesSection {
    fn default() -> Self {
        Self {
            directory: None,
            builtins: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Load from the standard locations, or defaults if no file exists.
    /// An explicit path must exist.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path) {
            Ok(path) => Self::load_from_file(&path),
            Err(_) if explicit_path.is_none() => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DraupnirError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            DraupnirError::Configuration(msg) => {
                DraupnirError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DraupnirError::Configuration(format!("failed to parse config: {e}")))
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(DraupnirError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".draupnir").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/draupnir/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(DraupnirError::Configuration(
            "no config file found. Create ~/.draupnir/config.toml or /etc/draupnir/config.toml"
                .to_string(),
        ))
    }

    pub fn retry_config(&self) -> RetryConfig {
        let s = &self.sampling;
        let mut retry = RetryConfig::new();
        if let Some(n) = s.retry_attempts {
            retry = retry.retry_attempts(n);
        }
        if let Some(ms) = s.retry_delay_ms {
            retry = retry.retry_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = s.max_delay_ms {
            retry = retry.max_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = s.timeout_ms {
            retry = retry.timeout(Duration::from_millis(ms));
        }
        retry
    }

    pub fn render_options(&self) -> RenderOptions {
        let mut render = RenderOptions::new();
        if let Some(strict) = self.sampling.strict_templates {
            render = render.strict(strict);
        }
        if let Some(include) = self.sampling.include_examples {
            render = render.include_examples(include);
        }
        render
    }

    pub fn sampling_config(&self) -> SamplingConfig {
        SamplingConfig::new()
            .retry(self.retry_config())
            .render(self.render_options())
    }

    pub fn cache_config(&self) -> CacheConfig {
        let c = &self.cache;
        let mut cache = CacheConfig::new();
        if let Some(enabled) = c.enabled {
            cache = cache.enabled(enabled);
        }
        if let Some(ms) = c.ttl_ms {
            cache = cache.default_ttl(Duration::from_millis(ms));
        }
        if let Some(n) = c.max_size {
            cache = cache.max_size(n);
        }
        if let Some(bytes) = c.max_memory_bytes {
            cache = cache.max_memory_bytes(bytes);
        }
        if let Some(failures) = c.cache_failures {
            cache = cache.cache_failures(failures);
        }
        for (id, ms) in &c.template_ttls {
            cache = cache.template_ttl(id.clone(), Duration::from_millis(*ms));
        }
        cache
    }

    pub fn structured_config(&self) -> StructuredConfig {
        self.structured
    }

    /// Template store for the `[templates]` section.
    pub fn template_store(&self) -> TemplateStore {
        let store = match &self.templates.directory {
            Some(dir) => TemplateStore::with_source(Arc::new(DirectoryTemplateSource::new(dir))),
            None => TemplateStore::new(),
        };
        store.builtins(self.templates.builtins)
    }
}
