//! `entire init [<agent>]` — install hooks.

use anyhow::{Context, Result};
use ent_agent::AgentRegistry;
use ent_agent::install::install_git_hooks;
use ent_git::Repo;

pub fn run(agent_name: Option<&str>) -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let repo = Repo::discover(&cwd)?;

    let changed = install_git_hooks(&repo)?;
    println!(
        "git hooks: {}",
        if changed { "installed" } else { "already installed" }
    );

    if let Some(agent_name) = agent_name {
        let registry = AgentRegistry::builtin();
        let agent = registry
            .get(agent_name)
            .with_context(|| format!("Unknown agent '{agent_name}'"))?;
        let changed = agent.install_hooks(repo.workdir())?;
        println!(
            "{} hooks: {}",
            agent_name,
            if changed { "installed" } else { "already installed" }
        );
    }
    Ok(())
}
