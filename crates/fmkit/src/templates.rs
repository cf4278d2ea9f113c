//! Few-shot prompt templates with `{variable}` placeholders, and a directory
//! store to keep them between runs.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Placeholder {{{0}}} is not a declared input variable")]
    UndeclaredVariable(String),

    #[error("No value given for input variable '{0}'")]
    MissingValue(String),

    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Template store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub model_id: String,
    #[serde(default)]
    pub description: String,
    pub input_prefix: String,
    pub output_prefix: String,
    pub input_text: String,
    #[serde(default)]
    pub input_variables: Vec<String>,
    /// Question/answer pairs shown before the input
    #[serde(default)]
    pub examples: Vec<(String, String)>,
}

impl PromptTemplate {
    /// Placeholder names in `input_text`, in first-seen order
    pub fn placeholders(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        PLACEHOLDER
            .captures_iter(&self.input_text)
            .map(|caps| caps[1].to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        match self
            .placeholders()
            .into_iter()
            .find(|name| !self.input_variables.contains(name))
        {
            Some(name) => Err(TemplateError::UndeclaredVariable(name)),
            None => Ok(()),
        }
    }

    /// Fill the placeholders and lay out the examples ahead of the input
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, TemplateError> {
        self.validate()?;
        for name in &self.input_variables {
            if !values.contains_key(name) {
                return Err(TemplateError::MissingValue(name.clone()));
            }
        }

        let input = PLACEHOLDER.replace_all(&self.input_text, |caps: &regex::Captures| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        });

        let mut prompt = String::new();
        for (question, answer) in &self.examples {
            prompt.push_str(&format!(
                "{} {}\n{} {}\n\n",
                self.input_prefix, question, self.output_prefix, answer
            ));
        }
        prompt.push_str(&format!(
            "{} {}\n{}",
            self.input_prefix, input, self.output_prefix
        ));
        Ok(prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTemplate {
    pub prompt_id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub template: PromptTemplate,
}

/// Templates kept as `<id>.json` files in one directory
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, prompt_id: &str) -> Result<PathBuf, TemplateError> {
        // only generated ids map to files
        Uuid::parse_str(prompt_id).map_err(|_| TemplateError::NotFound(prompt_id.to_string()))?;
        Ok(self.dir.join(format!("{}.json", prompt_id)))
    }

    fn write(&self, stored: &StoredTemplate) -> Result<(), TemplateError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&stored.prompt_id)?;
        fs::write(path, serde_json::to_string_pretty(stored)?)?;
        Ok(())
    }

    pub fn store(&self, template: PromptTemplate) -> Result<StoredTemplate, TemplateError> {
        template.validate()?;
        let now = Utc::now();
        let stored = StoredTemplate {
            prompt_id: Uuid::new_v4().to_string(),
            created_at: now,
            last_modified: now,
            template,
        };
        self.write(&stored)?;
        Ok(stored)
    }

    pub fn load(&self, prompt_id: &str) -> Result<StoredTemplate, TemplateError> {
        let path = self.path_for(prompt_id)?;
        if !path.exists() {
            return Err(TemplateError::NotFound(prompt_id.to_string()));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Stored templates, oldest first
    pub fn list(&self) -> Result<Vec<StoredTemplate>, TemplateError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut templates = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            templates.push(serde_json::from_str::<StoredTemplate>(&fs::read_to_string(
                &path,
            )?)?);
        }
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(templates)
    }

    pub fn update(
        &self,
        prompt_id: &str,
        template: PromptTemplate,
    ) -> Result<StoredTemplate, TemplateError> {
        template.validate()?;
        let mut stored = self.load(prompt_id)?;
        stored.template = template;
        stored.last_modified = Utc::now();
        self.write(&stored)?;
        Ok(stored)
    }

    pub fn delete(&self, prompt_id: &str) -> Result<(), TemplateError> {
        let path = self.path_for(prompt_id)?;
        if !path.exists() {
            return Err(TemplateError::NotFound(prompt_id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}
