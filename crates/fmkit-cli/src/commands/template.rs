use anyhow::{anyhow, Context, Result};
use console::style;
use fmkit::templates::{PromptTemplate, StoredTemplate, TemplateStore};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn read_template(file: &Path) -> Result<PromptTemplate> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a prompt template", file.display()))
}

fn print_summary(stored: &StoredTemplate) {
    println!(
        "{}  {}  {}",
        style(&stored.prompt_id).cyan(),
        style(&stored.template.name).bold(),
        style(stored.last_modified.format("%Y-%m-%d %H:%M:%S")).dim()
    );
}

pub fn store(store: &TemplateStore, file: &Path) -> Result<()> {
    let stored = store.store(read_template(file)?)?;
    println!("{} {}", style("Stored template").green(), stored.prompt_id);
    Ok(())
}

pub fn list(store: &TemplateStore) -> Result<()> {
    let templates = store.list()?;
    if templates.is_empty() {
        println!("No templates in {}", store.dir().display());
    }
    for stored in &templates {
        print_summary(stored);
    }
    Ok(())
}

pub fn show(store: &TemplateStore, id: &str) -> Result<()> {
    let stored = store.load(id)?;
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}

pub fn update(store: &TemplateStore, id: &str, file: &Path) -> Result<()> {
    let stored = store.update(id, read_template(file)?)?;
    print_summary(&stored);
    Ok(())
}

pub fn delete(store: &TemplateStore, id: &str) -> Result<()> {
    store.delete(id)?;
    println!("{} {}", style("Deleted template").green(), id);
    Ok(())
}

/// Parse `name=value` pairs given on the command line
fn parse_vars(vars: &[String]) -> Result<HashMap<String, String>> {
    vars.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", pair))
        })
        .collect()
}

pub fn render(store: &TemplateStore, id: &str, vars: &[String]) -> Result<()> {
    let stored = store.load(id)?;
    println!("{}", stored.template.render(&parse_vars(vars)?)?);
    Ok(())
}
