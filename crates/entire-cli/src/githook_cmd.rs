//! Entry points for the installed git hooks.

use crate::cli::GitHookCommands;
use crate::settings::Settings;
use anyhow::{Context, Result};
use ent_engine::Engine;
use ent_git::Repo;

/// Git hook handling never fails the user's git operation; problems are
/// logged and the process exits 0.
pub fn run(command: GitHookCommands) -> Result<()> {
    if let Err(err) = try_run(command) {
        tracing::warn!(error = ?err, "Git hook handling failed");
    }
    Ok(())
}

fn try_run(command: GitHookCommands) -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let repo = Repo::discover(&cwd)?;

    let settings = Settings::load(repo.workdir())?;
    if !settings.enabled {
        return Ok(());
    }

    let engine = Engine::new(&repo);
    match command {
        GitHookCommands::PostCommit => engine.post_commit(),
        GitHookCommands::PrepareCommitMsg { message_file } => {
            engine.prepare_commit_msg(&message_file)
        }
    }
}
