use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "entire", version)]
#[command(about = "Checkpoint and rewind engine for coding agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle an agent lifecycle hook (reads the payload from stdin)
    Hooks {
        /// Agent name (e.g. claude)
        agent: String,
        /// The agent's native hook event name
        event: String,
    },

    /// Show live sessions and checkpoint totals
    Status,

    /// Restore the working tree to a recorded checkpoint
    Rewind {
        /// List recorded checkpoints instead of rewinding
        #[arg(long)]
        list: bool,

        /// Checkpoint ID (12 hex characters)
        id: Option<String>,
    },

    /// Install git hooks (and, optionally, an agent's hooks)
    Init {
        /// Also install this agent's hooks into the worktree
        agent: Option<String>,
    },

    /// Entry points for the installed git hooks
    #[command(subcommand, hide = true)]
    GitHook(GitHookCommands),
}

#[derive(Subcommand)]
pub enum GitHookCommands {
    /// React to a user commit landing
    PostCommit,
    /// Insert the checkpoint trailer into the commit message
    PrepareCommitMsg { message_file: PathBuf },
}
