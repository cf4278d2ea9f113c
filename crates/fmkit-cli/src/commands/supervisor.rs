use anyhow::Result;
use console::style;
use fmkit::agent::RunConfig;
use fmkit::config::Settings;
use fmkit::models::message::Message;
use fmkit::profiles::AgentProfile;
use fmkit::supervisor::{Supervisor, SupervisorOutcome, MATH_KEYWORDS};

use super::{provider, report};

pub async fn execute(settings: &Settings, query: &str) -> Result<()> {
    let profile = AgentProfile::Math;
    let math_agent = profile.build_agent(
        provider(settings)?,
        profile.tools(None, settings.index.top_k)?,
        RunConfig::from_settings(&settings.agent),
    )?;
    let supervisor = Supervisor::new().with_route("math_agent", MATH_KEYWORDS, math_agent);

    match supervisor.run(&[Message::user().with_text(query)]).await? {
        SupervisorOutcome::Routed { route, outcome } => {
            println!("{} {}", style("Routed to").cyan(), route);
            report(&outcome, false);
        }
        SupervisorOutcome::Unrouted => {
            println!(
                "{}",
                style("No worker handles this query; nothing was sent to a model.").yellow()
            );
        }
    }
    Ok(())
}
