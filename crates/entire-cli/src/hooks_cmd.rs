//! `entire hooks <agent> <event>` — the agent-facing hook entry point.

use crate::settings::Settings;
use anyhow::{Context, Result};
use ent_agent::AgentRegistry;
use ent_engine::Engine;
use ent_git::Repo;
use std::io::Read;

/// Hooks exit 0 even when handling fails: a checkpointing problem must
/// never break the agent's own flow. Failures are logged instead.
pub fn run(agent_name: &str, event_name: &str) -> Result<()> {
    if let Err(err) = try_run(agent_name, event_name) {
        tracing::error!(
            agent = agent_name,
            event = event_name,
            error = ?err,
            "Hook handling failed"
        );
    }
    Ok(())
}

fn try_run(agent_name: &str, event_name: &str) -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let repo = Repo::discover(&cwd)?;

    let settings = Settings::load(repo.workdir())?;
    if !settings.enabled {
        return Ok(());
    }

    let registry = AgentRegistry::builtin();
    let agent = registry
        .get(agent_name)
        .with_context(|| format!("Unknown agent '{agent_name}'"))?;

    let mut payload = Vec::new();
    std::io::stdin()
        .read_to_end(&mut payload)
        .context("Failed to read hook payload from stdin")?;

    let event = agent.parse_hook_event(event_name, &payload)?;
    tracing::debug!(
        agent = agent_name,
        kind = %event.kind,
        session_id = %event.session_id,
        "Handling hook event"
    );

    let engine = Engine::new(&repo);
    engine.handle_event(agent, &event)
}
