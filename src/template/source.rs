//! Filesystem template source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::providers::TemplateSource;
use crate::types::Template;
use crate::{DraupnirError, Result};

/// Loads `<dir>/<id>.yaml`, `<dir>/<id>.yml` or `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateSource {
    dir: PathBuf,
}

impl DirectoryTemplateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TemplateSource for DirectoryTemplateSource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn load_template(&self, id: &str) -> Result<Option<Template>> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(DraupnirError::InvalidInput(format!(
                "invalid template id: {id:?}"
            )));
        }

        for ext in ["yaml", "yml", "json"] {
            let path = self.dir.join(format!("{id}.{ext}"));
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(DraupnirError::Configuration(format!(
                        "Failed to read template {path:?}: {e}"
                    )));
                }
            };
            let template: Template = if ext == "json" {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };
            if template.id != id {
                return Err(DraupnirError::Configuration(format!(
                    "template file {path:?} declares id '{}'",
                    template.id
                )));
            }
            return Ok(Some(template));
        }
        Ok(None)
    }
}
