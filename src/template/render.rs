//! Template rendering.
//!
//! Placeholders come in two equivalent spellings, `{{name}}` and `${name}`.
//! Block constructs nest freely:
//!
//! ```text
//! {{#if port}}EXPOSE {{port}}{{/if}}
//! {{#unless user}}USER 1000{{/unless}}
//! {{#each packages}}RUN install {{item}}{{#unless last}} && {{/unless}}{{/each}}
//! ```
//!
//! A variable is *truthy* when it is present, not null, and its string form
//! is not `""`, `"false"` or `"0"`. Numeric zero is therefore falsy too; this
//! is kept for compatibility with existing templates.
//!
//! Every render also sees read-only system variables (`_timestamp`,
//! `_date`, `_time`, `_year`, `_month`, `_day`) which shadow caller values.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;

use crate::types::{RenderMetadata, RenderedPrompt, Template};
use crate::{DraupnirError, Result};

type Scope = BTreeMap<String, Value>;

const BLOCK_KINDS: [&str; 3] = ["if", "unless", "each"];

/// Options controlling [`TemplateRenderer`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Fail on missing required variables. Default: true.
    pub strict: bool,
    /// Append the template's examples after the user text. Default: true.
    pub include_examples: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            strict: true,
            include_examples: true,
        }
    }
}

impl RenderOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable strict mode.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable or disable example blocks.
    pub fn include_examples(mut self, include: bool) -> Self {
        self.include_examples = include;
        self
    }
}

/// Pure `(template, variables) -> prompt` renderer.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    options: RenderOptions,
}

impl TemplateRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render using the current wall clock for system variables.
    pub fn render(
        &self,
        template: &Template,
        variables: &BTreeMap<String, Value>,
    ) -> Result<RenderedPrompt> {
        self.render_at(template, variables, Utc::now())
    }

    /// Render with an explicit timestamp for system variables.
    pub fn render_at(
        &self,
        template: &Template,
        variables: &BTreeMap<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<RenderedPrompt> {
        let mut scope = Scope::new();
        let mut missing = Vec::new();

        for decl in &template.variables {
            match variables.get(&decl.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    scope.insert(decl.name.clone(), value.clone());
                }
                None => match &decl.default {
                    Some(default) => {
                        scope.insert(decl.name.clone(), Value::String(default.clone()));
                    }
                    None if decl.required => missing.push(decl.name.clone()),
                    None => {}
                },
            }
        }

        if self.options.strict && !missing.is_empty() {
            return Err(DraupnirError::MissingRequiredVariables {
                template_id: template.id.clone(),
                missing,
            });
        }

        for (name, value) in variables {
            if !value.is_null() {
                scope.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        let resolved: Vec<String> = scope.keys().cloned().collect();

        scope.extend(system_variables(now));

        let system = expand(&template.system, &scope);
        let mut user = expand(&template.user, &scope);
        if self.options.include_examples && !template.examples.is_empty() {
            user.push_str("\n\nExamples:");
            for (i, example) in template.examples.iter().enumerate() {
                user.push_str(&format!(
                    "\n\nExample {}:\nInput:\n{}\nOutput:\n{}",
                    i + 1,
                    example.input,
                    example.output
                ));
            }
        }

        Ok(RenderedPrompt {
            system,
            user,
            metadata: RenderMetadata {
                template_id: template.id.clone(),
                template_version: template.version.clone(),
                rendered_at: now,
                resolved,
                missing,
                example_count: if self.options.include_examples {
                    template.examples.len()
                } else {
                    0
                },
            },
        })
    }
}

fn system_variables(now: DateTime<Utc>) -> Scope {
    let mut vars = Scope::new();
    vars.insert("_timestamp".into(), Value::String(now.to_rfc3339()));
    vars.insert(
        "_date".into(),
        Value::String(now.format("%Y-%m-%d").to_string()),
    );
    vars.insert(
        "_time".into(),
        Value::String(now.format("%H:%M:%S").to_string()),
    );
    vars.insert("_year".into(), Value::from(now.year()));
    vars.insert("_month".into(), Value::from(now.month()));
    vars.insert("_day".into(), Value::from(now.day()));
    vars
}

/// String form of a variable as it appears in rendered text.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(v) => {
            let s = stringify(v);
            !(s.is_empty() || s == "false" || s == "0")
        }
    }
}

/// Elements of an `each` target; JSON strings holding arrays are parsed.
fn iterable(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Expand blocks, then placeholders.
fn expand(text: &str, scope: &Scope) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((start, kind)) = find_block_open(rest) {
        out.push_str(&substitute(&rest[..start], scope));
        let block = &rest[start..];

        let Some(tag_end) = block.find("}}") else {
            out.push_str(block);
            return out;
        };
        let arg = block[3 + kind.len()..tag_end].trim();
        let body_start = tag_end + 2;

        match find_block_close(&block[body_start..], kind) {
            Some((body_len, close_len)) => {
                let body = &block[body_start..body_start + body_len];
                out.push_str(&render_block(kind, arg, body, scope));
                rest = &block[body_start + body_len + close_len..];
            }
            None => {
                // Unterminated: keep the open tag verbatim and carry on.
                out.push_str(&block[..body_start]);
                rest = &block[body_start..];
            }
        }
    }

    out.push_str(&substitute(rest, scope));
    out
}

fn render_block(kind: &str, arg: &str, body: &str, scope: &Scope) -> String {
    match kind {
        "if" if is_truthy(scope.get(arg)) => expand(body, scope),
        "unless" if !is_truthy(scope.get(arg)) => expand(body, scope),
        "each" => {
            let items = iterable(scope.get(arg));
            let last_index = items.len().saturating_sub(1);
            let mut out = String::new();
            for (index, item) in items.into_iter().enumerate() {
                let mut child = scope.clone();
                if let Value::Object(fields) = &item {
                    for (k, v) in fields {
                        child.insert(k.clone(), v.clone());
                    }
                }
                child.insert("item".into(), item);
                child.insert("index".into(), Value::from(index));
                child.insert("first".into(), Value::Bool(index == 0));
                child.insert("last".into(), Value::Bool(index == last_index));
                out.push_str(&expand(body, &child));
            }
            out
        }
        _ => String::new(),
    }
}

/// Position of the earliest `{{#kind ` tag and its kind.
fn find_block_open(text: &str) -> Option<(usize, &'static str)> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find("{{#") {
        let at = offset + pos;
        let after = &text[at + 3..];
        for kind in BLOCK_KINDS {
            if opens_kind(after, kind) {
                return Some((at, kind));
            }
        }
        offset = at + 3;
    }
    None
}

fn opens_kind(after_hash: &str, kind: &str) -> bool {
    after_hash.starts_with(kind)
        && after_hash[kind.len()..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace)
}

/// Find the close tag matching an already-consumed open tag of `kind`.
///
/// Returns `(body_len, close_tag_len)`.
fn find_block_close(body: &str, kind: &str) -> Option<(usize, usize)> {
    let open = format!("{{{{#{kind}");
    let close = format!("{{{{/{kind}}}}}");
    let mut depth = 1usize;
    let mut offset = 0;

    loop {
        let next_close = body[offset..].find(&close).map(|p| p + offset)?;
        let next_open = find_same_open(body, offset, &open, kind);
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                offset = o + open.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Some((next_close, close.len()));
                }
                offset = next_close + close.len();
            }
        }
    }
}

fn find_same_open(body: &str, from: usize, open: &str, kind: &str) -> Option<usize> {
    let mut offset = from;
    while let Some(pos) = body[offset..].find(open) {
        let at = offset + pos;
        if opens_kind(&body[at + 3..], kind) {
            return Some(at);
        }
        offset = at + open.len();
    }
    None
}

/// Replace `{{name}}` and `${name}` placeholders that resolve in `scope`.
/// Unresolved placeholders are left verbatim.
fn substitute(text: &str, scope: &Scope) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    loop {
        let mustache = rest.find("{{");
        let dollar = rest.find("${");
        let (start, open_len, close) = match (mustache, dollar) {
            (Some(m), Some(d)) if d < m => (d, 2, "}"),
            (Some(m), _) => (m, 2, "}}"),
            (None, Some(d)) => (d, 2, "}"),
            (None, None) => break,
        };

        out.push_str(&rest[..start]);
        let after = &rest[start + open_len..];
        let Some(end) = after.find(close) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after[..end].trim();
        let whole = &rest[start..start + open_len + end + close.len()];
        match scope.get(name).filter(|_| is_identifier(name)) {
            Some(value) if !value.is_null() => out.push_str(&stringify(value)),
            _ => out.push_str(whole),
        }
        rest = &rest[start + open_len + end + close.len()..];
    }

    out.push_str(rest);
    out
}

/// Flat names only. Record fields are bound directly inside `each`, so
/// dotted paths are not placeholders.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(pairs: &[(&str, Value)]) -> Scope {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn truthiness_rules() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!("false"))));
        assert!(!is_truthy(Some(&json!("0"))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!("yes"))));
        assert!(is_truthy(Some(&json!(8080))));
    }

    #[test]
    fn both_placeholder_syntaxes() {
        let s = scope(&[("name", json!("api"))]);
        assert_eq!(substitute("{{name}}/${name}/{{ name }}", &s), "api/api/api");
    }

    #[test]
    fn unresolved_placeholders_kept() {
        let s = Scope::new();
        assert_eq!(substitute("a {{x}} b ${y}", &s), "a {{x}} b ${y}");
    }

    #[test]
    fn dotted_names_are_not_placeholders() {
        let s = scope(&[("item.name", json!("x")), ("name", json!("http"))]);
        assert_eq!(substitute("{{item.name}} {{name}}", &s), "{{item.name}} http");
    }

    #[test]
    fn unterminated_placeholder_kept() {
        let s = scope(&[("x", json!("1"))]);
        assert_eq!(substitute("{{x}} {{x", &s), "1 {{x");
    }

    #[test]
    fn nested_if_blocks() {
        let s = scope(&[("a", json!("1")), ("b", json!(""))]);
        let text = "{{#if a}}A{{#if b}}B{{/if}}C{{/if}}";
        assert_eq!(expand(text, &s), "AC");
    }

    #[test]
    fn unless_block() {
        let s = scope(&[("user", json!("false"))]);
        assert_eq!(expand("{{#unless user}}USER 1000{{/unless}}", &s), "USER 1000");
    }

    #[test]
    fn each_binds_loop_variables() {
        let s = scope(&[("xs", json!(["a", "b", "c"]))]);
        let text = "{{#each xs}}{{index}}:{{item}}{{#unless last}},{{/unless}}{{/each}}";
        assert_eq!(expand(text, &s), "0:a,1:b,2:c");
    }

    #[test]
    fn each_parses_json_strings_and_records() {
        let s = scope(&[("ports", json!(r#"[{"name":"http","port":80}]"#))]);
        let text = "{{#each ports}}{{name}}={{port}}{{#if first}}!{{/if}}{{/each}}";
        assert_eq!(expand(text, &s), "http=80!");
    }

    #[test]
    fn nested_each_blocks() {
        let s = scope(&[("outer", json!([{"inner": [1, 2]}, {"inner": [3]}]))]);
        let text = "{{#each outer}}[{{#each inner}}{{item}}{{/each}}]{{/each}}";
        assert_eq!(expand(text, &s), "[12][3]");
    }

    #[test]
    fn unterminated_block_left_verbatim() {
        let s = scope(&[("a", json!("1"))]);
        assert_eq!(expand("{{#if a}}x {{a}}", &s), "{{#if a}}x 1");
    }
}
