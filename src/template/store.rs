//! Template store: loaded templates, cached until explicitly cleared.
//!
//! Resolution order for an id: in-memory cache, then the configured
//! [`TemplateSource`], then the built-in templates. An id unknown to all
//! three is a `TemplateNotFound` error.

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;

use super::builtin::builtin_template;
use crate::providers::TemplateSource;
use crate::types::Template;
use crate::{DraupnirError, Result};

/// Id-keyed store of loaded templates.
pub struct TemplateStore {
    loaded: Cache<String, Arc<Template>>,
    source: Option<Arc<dyn TemplateSource>>,
    use_builtins: bool,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Store backed by the built-in templates only.
    pub fn new() -> Self {
        Self {
            loaded: Cache::builder().build(),
            source: None,
            use_builtins: true,
        }
    }

    /// Store that consults `source` before the built-ins.
    pub fn with_source(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::new()
        }
    }

    /// Enable or disable the built-in fallback.
    pub fn builtins(mut self, enabled: bool) -> Self {
        self.use_builtins = enabled;
        self
    }

    /// Register a template directly, replacing any loaded one with the same id.
    pub async fn insert(&self, template: Template) {
        self.loaded
            .insert(template.id.clone(), Arc::new(template))
            .await;
    }

    /// Resolve a template by id.
    pub async fn get(&self, id: &str) -> Result<Arc<Template>> {
        if let Some(template) = self.loaded.get(id).await {
            return Ok(template);
        }

        let mut found = None;
        if let Some(source) = &self.source {
            found = source.load_template(id).await?;
            if found.is_some() {
                debug!(template = id, source = source.name(), "loaded template");
            }
        }
        if found.is_none() && self.use_builtins {
            found = builtin_template(id);
        }

        let template = Arc::new(found.ok_or_else(|| DraupnirError::TemplateNotFound(id.into()))?);
        self.loaded.insert(id.to_string(), template.clone()).await;
        Ok(template)
    }

    /// Ids of the currently loaded templates, sorted.
    pub fn list_loaded(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.loaded.iter().map(|(k, _)| (*k).clone()).collect();
        ids.sort();
        ids
    }

    /// Number of loaded templates.
    pub fn len(&self) -> usize {
        self.loaded.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every loaded template. The next `get` reloads from the source.
    pub async fn clear(&self) {
        self.loaded.invalidate_all();
        self.loaded.run_pending_tasks().await;
    }
}
