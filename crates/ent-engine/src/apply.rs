//! Transition driver.

use anyhow::{Result, bail};
use ent_core::machine::{Action, TransitionContext, resolve};
use ent_core::{HookEvent, Phase};
use ent_session::SessionState;

/// Side effects the transition table can request.
///
/// `warn_stale_session` has a default because it is the same everywhere;
/// the condense family is commit-specific and only the post-commit driver
/// implements it for real.
pub trait ActionHandler {
    fn condense(&mut self, state: &mut SessionState) -> Result<()>;

    fn condense_if_files_touched(&mut self, state: &mut SessionState) -> Result<()>;

    fn discard_if_no_files(&mut self, state: &mut SessionState) -> Result<()>;

    fn warn_stale_session(&mut self, state: &SessionState) -> Result<()> {
        tracing::warn!(
            session_id = %state.session_id,
            "Session announced a start while still active; previous run ended without a stop"
        );
        Ok(())
    }
}

/// Handler for lifecycle events outside a commit, where no condense action
/// can legitimately fire.
pub struct NoCommitHandler;

impl ActionHandler for NoCommitHandler {
    fn condense(&mut self, state: &mut SessionState) -> Result<()> {
        bail!(
            "condense requested outside a commit event for session '{}'",
            state.session_id
        );
    }

    fn condense_if_files_touched(&mut self, state: &mut SessionState) -> Result<()> {
        self.condense(state)
    }

    fn discard_if_no_files(&mut self, state: &mut SessionState) -> Result<()> {
        self.condense(state)
    }
}

/// Apply one event to a session's state.
///
/// Sets the new phase, then runs the resolved actions in two passes:
/// handler actions first, stopping at the first failure; common field
/// updates afterwards, unconditionally. The caller persists the state —
/// including after a handler error, so `last_interaction_time` and the
/// phase move even when condensation failed.
pub fn apply_transition(
    state: &mut SessionState,
    event: &HookEvent,
    ctx: &TransitionContext,
    handler: &mut dyn ActionHandler,
) -> Result<Phase> {
    let transition = resolve(state.phase, event.kind, ctx);
    state.phase = transition.next;

    let mut first_error = None;
    for action in transition.actions.iter().filter(|a| a.is_handler()) {
        let result = match action {
            Action::Condense => handler.condense(state),
            Action::CondenseIfFilesTouched => handler.condense_if_files_touched(state),
            Action::DiscardIfNoFiles => handler.discard_if_no_files(state),
            Action::WarnStaleSession => handler.warn_stale_session(state),
            _ => Ok(()),
        };
        if let Err(err) = result {
            first_error = Some(err);
            break;
        }
    }

    for action in transition.actions.iter().filter(|a| a.is_common()) {
        match action {
            Action::UpdateLastInteraction => {
                state.last_interaction_time = Some(event.effective_time());
            }
            Action::ClearEndedAt => state.ended_at = None,
            _ => {}
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(transition.next),
    }
}
