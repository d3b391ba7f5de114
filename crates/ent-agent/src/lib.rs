//! Agent adapters.
//!
//! Each supported agent implements [`Agent`]: it normalizes its native hook
//! payloads into engine events, analyzes its own transcript format, and
//! installs its hooks. The engine only ever talks to the trait.
//!
//! The registry is an explicit value constructed at program start and
//! passed down; there is no process-init side-effect registration.

pub mod claude;
pub mod install;

use anyhow::Result;
use ent_core::HookEvent;
use std::path::Path;

pub use claude::ClaudeAgent;

/// Token counts extracted from a transcript slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One opaque session artifact destined for a checkpoint's `session/`
/// directory: `(file_name, bytes)`.
pub type SessionArtifact = (String, Vec<u8>);

/// Capabilities every supported agent provides.
pub trait Agent {
    /// CLI-facing agent name (`entire hooks <name> …`).
    fn name(&self) -> &'static str;

    /// Native hook names this agent emits, in the agent's own vocabulary.
    fn hook_names(&self) -> &'static [&'static str];

    /// Normalize a native hook payload into an engine event.
    ///
    /// `declared_event` is the hook name the CLI was invoked with; agents
    /// whose payloads carry their own event name may prefer that.
    fn parse_hook_event(&self, declared_event: &str, payload: &[u8]) -> Result<HookEvent>;

    /// Install this agent's hooks for the given worktree. Idempotent:
    /// returns `true` when something was written, `false` when the hooks
    /// were already in place.
    fn install_hooks(&self, worktree: &Path) -> Result<bool>;

    /// Repo paths modified by file-writing tool calls in a transcript
    /// slice, ordered, without duplicates. Paths come back as the agent
    /// recorded them (usually absolute).
    fn extract_modified_files(&self, transcript_slice: &[u8]) -> Vec<String>;

    /// User prompts in a transcript slice, oldest first.
    fn extract_prompts(&self, transcript_slice: &[u8]) -> Vec<String>;

    /// The agent's own summary of the conversation, when it wrote one.
    fn extract_summary(&self, transcript_slice: &[u8]) -> Option<String>;

    /// Token usage accumulated over a transcript slice.
    fn token_usage(&self, transcript_slice: &[u8]) -> TokenUsage;

    /// Chunk agent-native session data for storage under a checkpoint's
    /// `session/` directory.
    fn chunk_session_artifacts(&self, transcript_slice: &[u8]) -> Vec<SessionArtifact>;
}

/// The set of agents this binary knows about.
pub struct AgentRegistry {
    agents: Vec<Box<dyn Agent>>,
}

impl AgentRegistry {
    /// Registry with every built-in agent.
    pub fn builtin() -> Self {
        Self {
            agents: vec![Box::new(ClaudeAgent)],
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Agent> {
        self.agents
            .iter()
            .find(|agent| agent.name() == name)
            .map(Box::as_ref)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.agents.iter().map(|agent| agent.name()).collect()
    }
}
