//! Commit message trailers.
//!
//! Two uses: the `Entire-Checkpoint` trailer inserted into the user's
//! commit message by the prepare-commit-msg hook, and the engine-internal
//! trailers shadow checkpoint commits carry so condensation can attribute
//! transcript slices without extra state.

use ent_core::CheckpointId;
use regex::Regex;
use std::sync::OnceLock;

/// Trailer key tying a user commit to its condensed checkpoint.
pub const COMMIT_TRAILER_KEY: &str = "Entire-Checkpoint";

/// Shadow commit trailer: the checkpoint's identifier.
pub(crate) const ID_TRAILER_KEY: &str = "Checkpoint-Id";

/// Shadow commit trailer: transcript line count at snapshot time.
pub(crate) const TRANSCRIPT_TRAILER_KEY: &str = "Transcript-Lines";

fn trailer_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*:\s").unwrap())
}

/// The value of the last `key: value` trailer line in `message`.
pub fn trailer_value(message: &str, key: &str) -> Option<String> {
    let prefix = format!("{key}: ");
    message
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(&prefix))
        .map(|value| value.trim().to_string())
}

/// Extract the checkpoint trailer from a user commit message.
pub fn extract_checkpoint_trailer(message: &str) -> Option<CheckpointId> {
    let value = trailer_value(message, COMMIT_TRAILER_KEY)?;
    CheckpointId::parse(&value).ok()
}

/// Insert `Entire-Checkpoint: <id>` into a commit message.
///
/// When the message already ends in a trailer block the new line goes in
/// front of it; otherwise a fresh block is appended. A message that
/// already carries the trailer is returned unchanged.
pub fn insert_checkpoint_trailer(message: &str, id: &CheckpointId) -> String {
    if trailer_value(message, COMMIT_TRAILER_KEY).is_some() {
        return message.to_string();
    }
    let trailer = format!("{COMMIT_TRAILER_KEY}: {id}");

    let trimmed = message.trim_end_matches('\n');
    if trimmed.is_empty() {
        return format!("{trailer}\n");
    }

    // Commit message comments (`#`) are not part of any paragraph.
    let lines: Vec<&str> = trimmed.lines().collect();
    let last_paragraph_start = lines
        .iter()
        .rposition(|line| line.trim().is_empty())
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let last_paragraph = &lines[last_paragraph_start..];
    let is_trailer_block = last_paragraph_start > 0
        && !last_paragraph.is_empty()
        && last_paragraph
            .iter()
            .all(|line| trailer_line_re().is_match(line) || line.starts_with('#'));

    let mut out_lines: Vec<String> = Vec::with_capacity(lines.len() + 2);
    if is_trailer_block {
        out_lines.extend(lines[..last_paragraph_start].iter().map(|l| l.to_string()));
        out_lines.push(trailer);
        out_lines.extend(last_paragraph.iter().map(|l| l.to_string()));
    } else {
        out_lines.extend(lines.iter().map(|l| l.to_string()));
        out_lines.push(String::new());
        out_lines.push(trailer);
    }
    let mut out = out_lines.join("\n");
    out.push('\n');
    out
}
