//! Prompt generators.
//!
//! A [`PromptGenerator`] turns an input text into a rendered prompt plus the
//! variables used to render it. [`TemplatePrompter`] is the built-in
//! implementation over `{{ name }}` placeholder templates.

use std::path::Path;

use serde_json::Value;

use crate::model::ModelConfig;
use crate::types::{RenderedPrompt, Variables};
use crate::{PromptifyError, Result};

/// Variable bound to the pipeline input text.
pub const TEXT_INPUT_VAR: &str = "text_input";

/// Produces the prompt sent to the model for one input.
pub trait PromptGenerator: Send + Sync {
    /// Render a prompt for `input`.
    ///
    /// `variables` are per-call values layered over the generator's own.
    fn generate(
        &self,
        input: &str,
        model: &ModelConfig,
        variables: &Variables,
    ) -> Result<RenderedPrompt>;

    /// Name recorded in conversation logs, when the prompt has one.
    fn identity(&self) -> Option<&str> {
        None
    }
}

/// Template with `{{ name }}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePrompter {
    template: String,
    defaults: Variables,
    identity: Option<String>,
}

impl TemplatePrompter {
    /// Template from inline text. Its identity is unknown.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            defaults: Variables::new(),
            identity: None,
        }
    }

    /// Template loaded from a file, identified by the file name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path)?;
        let identity = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Self {
            template,
            defaults: Variables::new(),
            identity,
        })
    }

    /// Set a default variable.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl PromptGenerator for TemplatePrompter {
    fn generate(
        &self,
        input: &str,
        _model: &ModelConfig,
        variables: &Variables,
    ) -> Result<RenderedPrompt> {
        if input.trim().is_empty() {
            return Err(PromptifyError::Template("input text is empty".into()));
        }

        let mut bound = self.defaults.clone();
        bound.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        bound.insert(TEXT_INPUT_VAR.into(), Value::from(input));

        let rendered = render(&self.template, &bound)?;
        Ok(RenderedPrompt::new(rendered, bound))
    }

    fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

/// Substitute every `{{ name }}` in `template` from `variables`.
///
/// String values are inserted verbatim, anything else as JSON.
pub fn render(template: &str, variables: &Variables) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(PromptifyError::Template(format!(
                "unclosed placeholder at byte {}",
                template.len() - rest.len() + start
            )));
        };

        let name = after[..end].trim();
        if name.is_empty() {
            return Err(PromptifyError::Template("empty placeholder".into()));
        }
        match variables.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
            None => {
                return Err(PromptifyError::Template(format!(
                    "unbound variable '{name}'"
                )));
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}
