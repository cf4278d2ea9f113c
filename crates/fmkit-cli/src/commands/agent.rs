use anyhow::{bail, Result};
use fmkit::agent::RunConfig;
use fmkit::config::Settings;
use fmkit::models::message::Message;
use fmkit::profiles::AgentProfile;

use super::{provider, report, run_agent};

pub async fn execute(
    settings: &Settings,
    profile: AgentProfile,
    query: &str,
    stream: bool,
) -> Result<()> {
    if profile == AgentProfile::Rag {
        bail!("the rag profile needs documents; use `fmkit rag --docs <dir> <query>`");
    }

    let registry = profile.tools(None, settings.index.top_k)?;
    let config = RunConfig::from_settings(&settings.agent).with_stream(stream);
    let agent = profile.build_agent(provider(settings)?, registry, config)?;

    let outcome = run_agent(&agent, &[Message::user().with_text(query)]).await?;
    report(&outcome, stream);
    Ok(())
}
