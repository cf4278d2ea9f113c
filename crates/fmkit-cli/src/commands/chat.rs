use anyhow::Result;
use chrono::Local;
use console::style;
use fmkit::agent::{Agent, RunConfig};
use fmkit::config::Settings;
use fmkit::models::message::Message;
use fmkit::storage::{HttpObjectStore, StorageStatus};
use fmkit::transcript::save_response;
use std::path::Path;
use tracing::warn;

use super::{provider, report, run_agent};

pub async fn execute(settings: &Settings, prompt: &str, stream: bool, save: bool) -> Result<()> {
    let agent = Agent::new(provider(settings)?)
        .with_name("chat")
        .with_config(RunConfig::from_settings(&settings.agent).with_stream(stream));

    let outcome = run_agent(&agent, &[Message::user().with_text(prompt)]).await?;
    report(&outcome, stream);

    if !save {
        return Ok(());
    }
    let response = outcome.final_text().unwrap_or_default();
    let path = save_response(&settings.output_dir, prompt, response, Local::now())?;
    println!("{} {}", style("Saved").green(), path.display());

    upload(settings, &path).await;
    Ok(())
}

/// Upload a saved transcript when object storage is configured; failures only warn
async fn upload(settings: &Settings, path: &Path) {
    let target = match settings.storage.status() {
        StorageStatus::Absent => return,
        StorageStatus::Incomplete { missing } => {
            warn!(missing = ?missing, "object storage is partly configured; skipping upload");
            println!(
                "{} storage is missing {}",
                style("Skipping upload:").yellow(),
                missing.join(", ")
            );
            return;
        }
        StorageStatus::Complete(target) => target,
    };

    let store = match HttpObjectStore::new(target, settings.api_key.clone()) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "could not create the object store client");
            return;
        }
    };
    // Keys mirror the path from the working directory, output dir included
    let base = std::env::current_dir().unwrap_or_default();
    match store.upload_file(path, &base).await {
        Ok(key) => println!(
            "{} {}/{}",
            style("Uploaded").green(),
            store.target().bucket,
            key
        ),
        Err(e) => {
            warn!(error = %e, "upload failed");
            println!("{} {}", style("Upload failed:").yellow(), e);
        }
    }
}
