pub mod agent;
pub mod chat;
pub mod flow;
pub mod rag;
pub mod supervisor;
pub mod template;
pub mod version;

use anyhow::Result;
use console::style;
use fmkit::agent::{Agent, RunOutcome, RunStatus};
use fmkit::config::Settings;
use fmkit::models::message::Message;
use fmkit::providers::openai::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use std::io::Write;
use std::sync::Arc;

pub(crate) fn provider(settings: &Settings) -> Result<Arc<OpenAiCompatibleProvider>> {
    let config = OpenAiCompatibleConfig::from_settings(settings);
    Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
}

/// Drive an agent, echoing fragments as they arrive when streaming
pub(crate) async fn run_agent(agent: &Agent, messages: &[Message]) -> Result<RunOutcome> {
    if !agent.config().stream {
        return Ok(agent.run(messages).await?);
    }

    let mut stdout = std::io::stdout();
    let outcome = agent
        .run_with(messages, |text| {
            print!("{}", text);
            let _ = stdout.flush();
        })
        .await?;
    println!();
    Ok(outcome)
}

/// Print the final answer and a one-line run summary
pub(crate) fn report(outcome: &RunOutcome, streamed: bool) {
    match outcome.final_text() {
        Some(text) if !streamed => println!("{}", text),
        Some(_) => {}
        None => println!("{}", style("The model returned an empty answer.").yellow()),
    }

    let status = match outcome.status {
        RunStatus::Completed => style("completed").green(),
        RunStatus::IterationLimit => style("stopped at the iteration limit").yellow(),
    };
    println!(
        "{}",
        style(format!(
            "[{} after {} model call(s), {} tokens]",
            status,
            outcome.iterations,
            outcome
                .usage
                .total_tokens
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string())
        ))
        .dim()
    );
}
