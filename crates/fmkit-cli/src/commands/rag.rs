use anyhow::{bail, Context, Result};
use console::style;
use fmkit::agent::RunConfig;
use fmkit::chunker::TextSplitter;
use fmkit::config::Settings;
use fmkit::models::message::Message;
use fmkit::profiles::AgentProfile;
use fmkit::retrieval::KeywordIndex;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{provider, report, run_agent};

pub async fn execute(settings: &Settings, docs: &Path, query: &str, search_only: bool) -> Result<()> {
    let splitter = TextSplitter::new(settings.index.chunk_size, settings.index.chunk_overlap)?;
    let index = KeywordIndex::from_dir(docs, &splitter)
        .with_context(|| format!("Failed to index {}", docs.display()))?;
    if index.is_empty() {
        bail!("no .txt or .md documents found in {}", docs.display());
    }
    info!(chunks = index.len(), dir = %docs.display(), "indexed documents");

    if search_only {
        for passage in index.search(query, settings.index.top_k) {
            println!(
                "{} {}",
                style(format!("[{:.2}]", passage.score)).cyan(),
                passage.source.as_deref().unwrap_or("-")
            );
            println!("{}\n", passage.text);
        }
        return Ok(());
    }

    let profile = AgentProfile::Rag;
    let registry = profile.tools(Some(Arc::new(index)), settings.index.top_k)?;
    let agent = profile.build_agent(
        provider(settings)?,
        registry,
        RunConfig::from_settings(&settings.agent),
    )?;

    let outcome = run_agent(&agent, &[Message::user().with_text(query)]).await?;
    report(&outcome, false);
    Ok(())
}
