use super::*;

fn ctx() -> TransitionContext {
    TransitionContext::default()
}

fn ctx_with_files() -> TransitionContext {
    TransitionContext {
        rebase_in_progress: false,
        has_files_touched: true,
    }
}

fn rebase_ctx() -> TransitionContext {
    TransitionContext {
        rebase_in_progress: true,
        has_files_touched: true,
    }
}

// ── Idle rows ────────────────────────────────────────────────────

#[test]
fn test_idle_turn_start_becomes_active() {
    let t = resolve(Phase::Idle, EventKind::TurnStart, &ctx());
    assert_eq!(t.next, Phase::Active);
    assert_eq!(t.actions, &[Action::UpdateLastInteraction]);
}

#[test]
fn test_idle_git_commit_condenses_in_place() {
    let t = resolve(Phase::Idle, EventKind::GitCommit, &ctx());
    assert_eq!(t.next, Phase::Idle);
    assert_eq!(t.actions, &[Action::Condense, Action::UpdateLastInteraction]);
}

#[test]
fn test_idle_session_stop_ends() {
    let t = resolve(Phase::Idle, EventKind::SessionStop, &ctx());
    assert_eq!(t.next, Phase::Ended);
    assert_eq!(t.actions, &[Action::UpdateLastInteraction]);
}

#[test]
fn test_idle_turn_end_is_noop() {
    let t = resolve(Phase::Idle, EventKind::TurnEnd, &ctx());
    assert_eq!(t.next, Phase::Idle);
    assert!(t.actions.is_empty());
}

#[test]
fn test_idle_session_start_is_noop() {
    let t = resolve(Phase::Idle, EventKind::SessionStart, &ctx());
    assert_eq!(t.next, Phase::Idle);
    assert!(t.actions.is_empty());
}

// ── Active rows ──────────────────────────────────────────────────

#[test]
fn test_active_turn_start_stays_active() {
    let t = resolve(Phase::Active, EventKind::TurnStart, &ctx());
    assert_eq!(t.next, Phase::Active);
    assert_eq!(t.actions, &[Action::UpdateLastInteraction]);
}

#[test]
fn test_active_turn_end_becomes_idle() {
    let t = resolve(Phase::Active, EventKind::TurnEnd, &ctx());
    assert_eq!(t.next, Phase::Idle);
    assert_eq!(t.actions, &[Action::UpdateLastInteraction]);
}

#[test]
fn test_active_git_commit_condenses_and_stays_active() {
    let t = resolve(Phase::Active, EventKind::GitCommit, &ctx_with_files());
    assert_eq!(t.next, Phase::Active);
    assert_eq!(t.actions, &[Action::Condense, Action::UpdateLastInteraction]);
}

#[test]
fn test_active_session_stop_ends() {
    let t = resolve(Phase::Active, EventKind::SessionStop, &ctx());
    assert_eq!(t.next, Phase::Ended);
    assert_eq!(t.actions, &[Action::UpdateLastInteraction]);
}

#[test]
fn test_active_session_start_warns_stale() {
    let t = resolve(Phase::Active, EventKind::SessionStart, &ctx());
    assert_eq!(t.next, Phase::Active);
    assert_eq!(t.actions, &[Action::WarnStaleSession]);
}

// ── Ended rows ───────────────────────────────────────────────────

#[test]
fn test_ended_turn_start_reactivates_and_clears_ended_at() {
    let t = resolve(Phase::Ended, EventKind::TurnStart, &ctx());
    assert_eq!(t.next, Phase::Active);
    assert_eq!(
        t.actions,
        &[Action::ClearEndedAt, Action::UpdateLastInteraction]
    );
}

#[test]
fn test_ended_session_start_becomes_idle() {
    let t = resolve(Phase::Ended, EventKind::SessionStart, &ctx());
    assert_eq!(t.next, Phase::Idle);
    assert_eq!(t.actions, &[Action::ClearEndedAt]);
}

#[test]
fn test_ended_git_commit_with_files_condenses() {
    let t = resolve(Phase::Ended, EventKind::GitCommit, &ctx_with_files());
    assert_eq!(t.next, Phase::Ended);
    assert_eq!(
        t.actions,
        &[Action::CondenseIfFilesTouched, Action::UpdateLastInteraction]
    );
}

#[test]
fn test_ended_git_commit_without_files_discards() {
    let t = resolve(Phase::Ended, EventKind::GitCommit, &ctx());
    assert_eq!(t.next, Phase::Ended);
    assert_eq!(
        t.actions,
        &[Action::DiscardIfNoFiles, Action::UpdateLastInteraction]
    );
}

#[test]
fn test_ended_turn_end_is_noop() {
    let t = resolve(Phase::Ended, EventKind::TurnEnd, &ctx());
    assert_eq!(t.next, Phase::Ended);
    assert!(t.actions.is_empty());
}

// ── Rebase guard ─────────────────────────────────────────────────

#[test]
fn test_git_commit_during_rebase_is_noop_for_every_phase() {
    for phase in [Phase::Idle, Phase::Active, Phase::Ended] {
        let t = resolve(phase, EventKind::GitCommit, &rebase_ctx());
        assert_eq!(t.next, phase);
        assert!(t.actions.is_empty(), "phase {phase} acted during rebase");
    }
}

#[test]
fn test_rebase_does_not_block_non_commit_events() {
    let t = resolve(Phase::Idle, EventKind::TurnStart, &rebase_ctx());
    assert_eq!(t.next, Phase::Active);
}

// ── Action classification ────────────────────────────────────────

#[test]
fn test_action_classification_is_a_partition() {
    let all = [
        Action::Condense,
        Action::CondenseIfFilesTouched,
        Action::DiscardIfNoFiles,
        Action::WarnStaleSession,
        Action::ClearEndedAt,
        Action::UpdateLastInteraction,
    ];
    for action in all {
        assert_ne!(action.is_handler(), action.is_common());
    }
    assert!(Action::Condense.is_handler());
    assert!(Action::UpdateLastInteraction.is_common());
    assert!(Action::ClearEndedAt.is_common());
}
