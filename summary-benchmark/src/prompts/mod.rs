//! Prompt templates and their rendering against documents

pub mod builtin;
pub mod extract;

pub use builtin::{builtin, BUILTIN_IDS, KEY_SENTENCE_EXTRACTION};
pub use extract::{lexrank, split_sentences};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::{ConfigError, PromptConfig};
use crate::dataset::Document;

/// Shown instead of the abstract in logged prompts
pub const SANITIZED_ABSTRACT: &str = "[Abstract text not shown]";

const NO_TITLE: &str = "No title available";
const NO_YEAR: &str = "No year available";
const NO_KEYWORDS: &str = "No keywords available";

/// A prompt variant before it is bound to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub template: String,
    /// Generalized text for the results table
    pub label: Option<String>,
}

impl PromptTemplate {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Table label; the unfilled template when none was given
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.template)
    }

    pub fn uses_extract(&self) -> bool {
        self.template.contains("{extract}")
    }

    /// Fill placeholders from a document.
    ///
    /// `extract` stands in for `{extract}`; the full abstract is used when
    /// it is `None`. Unknown placeholders are left as written.
    pub fn render(&self, document: &Document, extract: Option<&str>) -> String {
        render_template(&self.template, document, document.abstract_text.as_str(), extract)
    }

    /// Same as [`render`](Self::render) with the abstract and extract hidden
    pub fn render_sanitized(&self, document: &Document) -> String {
        render_template(&self.template, document, SANITIZED_ABSTRACT, Some(SANITIZED_ABSTRACT))
    }
}

fn render_template(template: &str, document: &Document, abstract_text: &str, extract: Option<&str>) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

    // Single pass, so text substituted in is never re-expanded
    re.replace_all(template, |caps: &Captures| match &caps[1] {
        "abstract" => abstract_text.to_string(),
        "extract" => extract.unwrap_or(abstract_text).to_string(),
        "title" => document.title.clone().unwrap_or_else(|| NO_TITLE.to_string()),
        "year" => document.year.clone().unwrap_or_else(|| NO_YEAR.to_string()),
        "keywords" => {
            if document.keywords.is_empty() {
                NO_KEYWORDS.to_string()
            } else {
                document.keywords.join(", ")
            }
        }
        _ => caps[0].to_string(),
    })
    .into_owned()
}

/// A template bound to one document
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// 1-based position in the run's prompt list
    pub number: usize,
    pub id: String,
    /// Full text sent to the generator
    pub text: String,
    /// Text with the abstract hidden, for logs
    pub sanitized: String,
    /// Generalized text for the results table
    pub label: String,
}

/// The prompt variants of a run, in configured order
#[derive(Debug, Clone, Default)]
pub struct PromptSet {
    templates: Vec<PromptTemplate>,
}

impl PromptSet {
    pub fn new(templates: Vec<PromptTemplate>) -> Self {
        Self { templates }
    }

    /// Resolve `[[prompts]]` entries into templates
    pub fn from_config(prompts: &[PromptConfig]) -> Result<Self, ConfigError> {
        let mut templates = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let mut template = match (&prompt.builtin, &prompt.template) {
                (Some(name), None) => {
                    let mut t = builtin(name).ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "prompt '{}': unknown builtin '{}' (available: {})",
                            prompt.id,
                            name,
                            BUILTIN_IDS.join(", ")
                        ))
                    })?;
                    t.id = prompt.id.clone();
                    t
                }
                (None, Some(text)) => PromptTemplate::new(&prompt.id, text),
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "prompt '{}' needs exactly one of builtin or template",
                        prompt.id
                    )))
                }
            };
            if let Some(label) = &prompt.label {
                template = template.with_label(label);
            }
            templates.push(template);
        }
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[PromptTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Any template wants extracted key sentences
    pub fn uses_extract(&self) -> bool {
        self.templates.iter().any(|t| t.uses_extract())
    }

    /// Render every template for one document
    pub fn build_prompts(&self, document: &Document, extract: Option<&str>) -> Vec<Prompt> {
        self.templates
            .iter()
            .enumerate()
            .map(|(i, template)| Prompt {
                number: i + 1,
                id: template.id.clone(),
                text: template.render(document, extract),
                sanitized: template.render_sanitized(document),
                label: template.label().to_string(),
            })
            .collect()
    }
}
