/*!
 * Named prompt templates.
 *
 * Templates use `${KEY}` substitution tokens. The migration pipeline uses
 * `system`, `full`, `class_only` and `methods_only`, with the code to
 * translate in `${CODE}`.
 */

use std::collections::BTreeMap;

use crate::errors::ConfigError;

pub const SYSTEM_PROMPT: &str = "system";
pub const FULL_PROMPT: &str = "full";
pub const CLASS_ONLY_PROMPT: &str = "class_only";
pub const METHODS_ONLY_PROMPT: &str = "methods_only";

/// Replace every `${KEY}` token with its value
pub fn substitute(template: &str, replacements: &[(&str, &str)]) -> String {
    replacements.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("${{{}}}", key), value)
    })
}

/// Prompt templates by name
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    templates: BTreeMap<String, String>,
}

impl PromptLibrary {
    pub fn new(templates: BTreeMap<String, String>) -> Self {
        Self { templates }
    }

    /// The template called `name`; missing or empty templates are configuration errors
    pub fn template(&self, name: &str) -> Result<&str, ConfigError> {
        self.templates
            .get(name)
            .map(String::as_str)
            .filter(|template| !template.is_empty())
            .ok_or_else(|| ConfigError::MissingPrompt(name.to_string()))
    }

    /// The template called `name`, if it is declared and not empty
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.template(name).ok()
    }

    pub fn render(&self, name: &str, replacements: &[(&str, &str)]) -> Result<String, ConfigError> {
        Ok(substitute(self.template(name)?, replacements))
    }

    /// Render a code prompt, filling `${CODE}`
    pub fn render_code(&self, name: &str, code: &str) -> Result<String, ConfigError> {
        self.render(name, &[("CODE", code)])
    }
}
