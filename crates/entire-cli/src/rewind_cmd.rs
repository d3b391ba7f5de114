//! `entire rewind [--list] [<id>]`.

use anyhow::{Context, Result};
use ent_core::CheckpointId;
use ent_engine::Engine;
use ent_git::Repo;

pub fn run(list: bool, id: Option<&str>) -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let repo = Repo::discover(&cwd)?;
    let engine = Engine::new(&repo);

    // Without an ID there is nothing to restore; show the list instead.
    let Some(id) = id.filter(|_| !list) else {
        let summaries = engine.list_checkpoints()?;
        if summaries.is_empty() {
            println!("no recorded checkpoints");
            return Ok(());
        }
        for summary in &summaries {
            println!(
                "{}  {}  {}  {} file(s)",
                summary.checkpoint_id,
                summary.created_at.format("%Y-%m-%d %H:%M:%S"),
                summary.session_id,
                summary.files_touched.len(),
            );
        }
        return Ok(());
    };

    let id = CheckpointId::parse(id)?;
    let report = engine.rewind(&id)?;
    println!(
        "rewound to {id}: restored {} file(s), deleted {} file(s)",
        report.restored.len(),
        report.deleted.len(),
    );
    for path in &report.deleted {
        println!("  deleted {path}");
    }
    Ok(())
}
