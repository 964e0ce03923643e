//! Template interpolation for stream definitions
//!
//! Handles `{{ variable }}` interpolation in endpoint paths, query params and
//! request bodies. Variables resolve against five roots:
//!
//! - `config.*` tap configuration
//! - `partition.*` the partition being synced (e.g. `partition.publisher_id`)
//! - `page.*` the pagination position (`page.token`, `page.offset`,
//!   `page.window_start`, `page.window_end`)
//! - `bookmark` the replication value records must exceed, if any
//! - `vars.*` anything else the caller injects

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
});

fn template_regex() -> Result<&'static Regex> {
    TEMPLATE_REGEX
        .as_ref()
        .map_err(|e| Error::template(format!("Invalid template pattern: {e}")))
}

/// Roots a template variable can start with
pub const ROOTS: &[&str] = &["config", "partition", "page", "bookmark", "vars"];

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Tap configuration values
    pub config: Value,
    /// Current partition values
    pub partition: Value,
    /// Pagination position values
    pub page: Value,
    /// Replication-key high-water mark
    pub bookmark: Value,
    /// Additional context variables
    pub vars: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set partition values
    pub fn set_partition(&mut self, partition: Value) -> &mut Self {
        self.partition = partition;
        self
    }

    /// Set page values
    pub fn set_page(&mut self, page: Value) -> &mut Self {
        self.page = page;
        self
    }

    /// Set the bookmark value
    pub fn set_bookmark(&mut self, bookmark: Value) -> &mut Self {
        self.bookmark = bookmark;
        self
    }

    /// Set additional variables
    pub fn set_vars(&mut self, vars: Value) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Get a value by path (e.g., "partition.publisher_id")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let root = match parts.next()? {
            "config" => &self.config,
            "partition" => &self.partition,
            "page" => &self.page,
            "bookmark" => &self.bookmark,
            "vars" => &self.vars,
            _ => return None,
        };

        let mut current = root;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }

        // An unset root (e.g. no bookmark yet) counts as undefined
        if current.is_null() && std::ptr::eq(current, root) {
            return None;
        }
        Some(current)
    }
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let regex = template_regex()?;
    let mut result = String::with_capacity(template.len());
    let mut last = 0;
    let mut missing = Vec::new();

    for cap in regex.captures_iter(template) {
        let Some(whole) = cap.get(0) else { continue };
        let var_path = &cap[1];

        result.push_str(&template[last..whole.start()]);
        match ctx.get(var_path) {
            Some(value) => result.push_str(&value_to_string(value)),
            None => missing.push(var_path.to_string()),
        }
        last = whole.end();
    }
    result.push_str(&template[last..]);

    if missing.is_empty() {
        Ok(result)
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    template_regex().is_ok_and(|re| re.is_match(s))
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    match template_regex() {
        Ok(re) => re
            .captures_iter(template)
            .map(|cap| cap[1].to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Render all string values in a JSON value (keys are left alone)
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) if has_templates(s) => Ok(Value::String(render(s, ctx)?)),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                rendered.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(Value::Object(rendered))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| render_value(v, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Ok(value.clone()),
    }
}
