use anyhow::Result;
use clap::Parser;

mod cli;
mod githook_cmd;
mod hooks_cmd;
mod init_cmd;
mod rewind_cmd;
mod settings;
mod status_cmd;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr; ENTIRE_LOG_LEVEL selects verbosity.
    let filter = tracing_subscriber::EnvFilter::try_from_env("ENTIRE_LOG_LEVEL")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Hooks { agent, event } => hooks_cmd::run(&agent, &event),
        Commands::Status => status_cmd::run(),
        Commands::Rewind { list, id } => rewind_cmd::run(list, id.as_deref()),
        Commands::Init { agent } => init_cmd::run(agent.as_deref()),
        Commands::GitHook(command) => githook_cmd::run(command),
    }
}
