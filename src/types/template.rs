//! Prompt template definitions.

use serde::{Deserialize, Serialize};

/// A declared template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl VariableDecl {
    /// A required variable without default.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
        }
    }

    /// An optional variable without default.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// An input/output example appended after the user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateExample {
    pub input: String,
    pub output: String,
}

/// A named, versioned prompt skeleton.
///
/// Templates are immutable once loaded. The version participates in the
/// response cache key so a template edit never serves stale responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system: String,
    pub user: String,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub examples: Vec<TemplateExample>,
}

impl Template {
    /// Create a template with empty system text and no declarations.
    pub fn new(id: impl Into<String>, version: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            description: String::new(),
            system: String::new(),
            user: user.into(),
            variables: Vec::new(),
            examples: Vec::new(),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the system text.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Declare a variable.
    pub fn variable(mut self, decl: VariableDecl) -> Self {
        self.variables.push(decl);
        self
    }

    /// Append an example.
    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push(TemplateExample {
            input: input.into(),
            output: output.into(),
        });
        self
    }

    /// Look up a variable declaration by name.
    pub fn declaration(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|v| v.name == name)
    }
}
