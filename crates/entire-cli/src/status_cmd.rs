//! `entire status` — live sessions and checkpoint totals.

use crate::settings::Settings;
use anyhow::{Context, Result};
use ent_engine::Engine;
use ent_git::Repo;

pub fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let repo = Repo::discover(&cwd)?;
    let settings = Settings::load(repo.workdir())?;
    let engine = Engine::new(&repo);

    println!(
        "checkpointing: {}",
        if settings.enabled { "enabled" } else { "disabled" }
    );

    let sessions = engine.store().list()?;
    if sessions.is_empty() {
        println!("sessions: none");
    } else {
        println!("sessions:");
        for session in &sessions {
            let base = &session.base_commit[..session.base_commit.len().min(8)];
            println!(
                "  {}  {}  base {}  steps {}  files {}",
                session.session_id,
                session.phase,
                base,
                session.step_count,
                session.files_touched.len(),
            );
        }
    }

    let checkpoints = engine.list_checkpoints()?;
    println!("recorded checkpoints: {}", checkpoints.len());
    Ok(())
}
