//! The phase transition table.
//!
//! The table is data; [`resolve`] is a pure lookup. Running the resulting
//! actions (and persisting the new phase) is the driver's job, so this
//! module stays free of I/O.

use crate::event::EventKind;
use crate::phase::Phase;

/// Actions a transition can request.
///
/// Handler actions do real work and abort the action list on first failure;
/// common actions are plain field updates that must run even when a handler
/// failed earlier in the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Condense the session's shadow branch into the metadata branch.
    Condense,
    /// Condense only when the session still has touched files.
    CondenseIfFilesTouched,
    /// Drop the session's shadow branch; nothing worth condensing.
    DiscardIfNoFiles,
    /// Log that an agent re-announced a session that never ended.
    WarnStaleSession,
    /// Clear the session's `ended_at` marker.
    ClearEndedAt,
    /// Stamp the session's `last_interaction_time`.
    UpdateLastInteraction,
}

impl Action {
    /// Handler actions are delegated to the engine and may fail.
    pub fn is_handler(&self) -> bool {
        matches!(
            self,
            Self::Condense
                | Self::CondenseIfFilesTouched
                | Self::DiscardIfNoFiles
                | Self::WarnStaleSession
        )
    }

    /// Common actions are infallible field updates.
    pub fn is_common(&self) -> bool {
        !self.is_handler()
    }
}

/// Flags the table consults when picking a row.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    pub rebase_in_progress: bool,
    pub has_files_touched: bool,
}

/// Row guard. `Always` rows match unconditionally; the rebase guards only
/// matter for GitCommit rows, where a rebase must make the whole event a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    Always,
    NotRebase,
    NotRebaseWithFiles,
    NotRebaseWithoutFiles,
}

impl Guard {
    fn holds(&self, ctx: &TransitionContext) -> bool {
        match self {
            Self::Always => true,
            Self::NotRebase => !ctx.rebase_in_progress,
            Self::NotRebaseWithFiles => !ctx.rebase_in_progress && ctx.has_files_touched,
            Self::NotRebaseWithoutFiles => !ctx.rebase_in_progress && !ctx.has_files_touched,
        }
    }
}

struct Rule {
    from: Phase,
    on: EventKind,
    when: Guard,
    to: Phase,
    actions: &'static [Action],
}

/// The resolved transition: the phase to move to and the actions to run, in
/// order.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub next: Phase,
    pub actions: &'static [Action],
}

const RULES: &[Rule] = &[
    Rule {
        from: Phase::Idle,
        on: EventKind::TurnStart,
        when: Guard::Always,
        to: Phase::Active,
        actions: &[Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Idle,
        on: EventKind::GitCommit,
        when: Guard::NotRebase,
        to: Phase::Idle,
        actions: &[Action::Condense, Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Idle,
        on: EventKind::SessionStop,
        when: Guard::Always,
        to: Phase::Ended,
        actions: &[Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Active,
        on: EventKind::TurnStart,
        when: Guard::Always,
        to: Phase::Active,
        actions: &[Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Active,
        on: EventKind::TurnEnd,
        when: Guard::Always,
        to: Phase::Idle,
        actions: &[Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Active,
        on: EventKind::GitCommit,
        when: Guard::NotRebase,
        to: Phase::Active,
        actions: &[Action::Condense, Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Active,
        on: EventKind::SessionStop,
        when: Guard::Always,
        to: Phase::Ended,
        actions: &[Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Active,
        on: EventKind::SessionStart,
        when: Guard::Always,
        to: Phase::Active,
        actions: &[Action::WarnStaleSession],
    },
    Rule {
        from: Phase::Ended,
        on: EventKind::TurnStart,
        when: Guard::Always,
        to: Phase::Active,
        actions: &[Action::ClearEndedAt, Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Ended,
        on: EventKind::SessionStart,
        when: Guard::Always,
        to: Phase::Idle,
        actions: &[Action::ClearEndedAt],
    },
    Rule {
        from: Phase::Ended,
        on: EventKind::GitCommit,
        when: Guard::NotRebaseWithFiles,
        to: Phase::Ended,
        actions: &[Action::CondenseIfFilesTouched, Action::UpdateLastInteraction],
    },
    Rule {
        from: Phase::Ended,
        on: EventKind::GitCommit,
        when: Guard::NotRebaseWithoutFiles,
        to: Phase::Ended,
        actions: &[Action::DiscardIfNoFiles, Action::UpdateLastInteraction],
    },
];

/// Look up the transition for `(phase, event)` under `ctx`.
///
/// Combinations without a matching row keep the current phase and run no
/// actions; in particular every GitCommit during a rebase falls through
/// here.
pub fn resolve(phase: Phase, event: EventKind, ctx: &TransitionContext) -> Transition {
    for rule in RULES {
        if rule.from == phase && rule.on == event && rule.when.holds(ctx) {
            return Transition {
                next: rule.to,
                actions: rule.actions,
            };
        }
    }
    Transition {
        next: phase,
        actions: &[],
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod machine_tests;
