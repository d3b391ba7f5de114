//! Claude Code adapter.
//!
//! Hook payloads arrive as one JSON document on stdin; transcripts are
//! JSONL files where assistant messages carry `tool_use` content blocks.

use crate::{Agent, SessionArtifact, TokenUsage};
use anyhow::{Context, Result, bail};
use ent_core::{EventKind, HookEvent};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Tool names whose invocations modify files, mapped to the input key
/// naming the file.
const FILE_TOOLS: &[(&str, &str)] = &[
    ("Write", "file_path"),
    ("Edit", "file_path"),
    ("MultiEdit", "file_path"),
    ("NotebookEdit", "notebook_path"),
];

/// Upper bound for one stored session chunk.
const CHUNK_BYTES: usize = 1 << 20;

pub struct ClaudeAgent;

impl ClaudeAgent {
    fn map_event(name: &str) -> Option<EventKind> {
        match name {
            "UserPromptSubmit" => Some(EventKind::TurnStart),
            "Stop" => Some(EventKind::TurnEnd),
            "SessionStart" => Some(EventKind::SessionStart),
            "SessionEnd" => Some(EventKind::SessionStop),
            _ => None,
        }
    }
}

impl Agent for ClaudeAgent {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn hook_names(&self) -> &'static [&'static str] {
        &["UserPromptSubmit", "Stop", "SessionStart", "SessionEnd"]
    }

    fn parse_hook_event(&self, declared_event: &str, payload: &[u8]) -> Result<HookEvent> {
        let doc: Value = serde_json::from_slice(payload).context("Invalid hook payload JSON")?;

        // The payload's own event name wins over the CLI argument; they
        // only disagree when a hook entry was wired to the wrong command.
        let name = doc
            .get("hook_event_name")
            .and_then(Value::as_str)
            .unwrap_or(declared_event);
        let Some(kind) = Self::map_event(name) else {
            bail!("Unsupported hook event '{name}'");
        };

        let session_id = doc
            .get("session_id")
            .and_then(Value::as_str)
            .context("Hook payload has no session_id")?
            .to_string();

        let mut event = HookEvent::new(kind, session_id);
        event.session_ref = doc
            .get("transcript_path")
            .and_then(Value::as_str)
            .map(String::from);
        event.prompt = doc.get("prompt").and_then(Value::as_str).map(String::from);
        Ok(event)
    }

    fn install_hooks(&self, worktree: &Path) -> Result<bool> {
        let settings_path = worktree.join(".claude").join("settings.json");
        let mut settings: Value = match fs::read_to_string(&settings_path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Invalid JSON in {}", settings_path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                serde_json::json!({})
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read {}", settings_path.display()));
            }
        };

        let mut changed = false;
        let hooks = settings
            .as_object_mut()
            .context("settings.json is not a JSON object")?
            .entry("hooks")
            .or_insert_with(|| serde_json::json!({}));

        for hook_name in self.hook_names() {
            let command = format!("entire hooks claude {hook_name}");
            let entries = hooks
                .as_object_mut()
                .context("hooks is not a JSON object")?
                .entry(*hook_name)
                .or_insert_with(|| serde_json::json!([]));
            let entries = entries
                .as_array_mut()
                .context("hook entry is not an array")?;

            let already_wired = entries.iter().any(|entry| {
                entry["hooks"]
                    .as_array()
                    .is_some_and(|hooks| hooks.iter().any(|h| h["command"] == command.as_str()))
            });
            if already_wired {
                continue;
            }
            entries.push(serde_json::json!({
                "hooks": [{"type": "command", "command": command}]
            }));
            changed = true;
        }

        if changed {
            fs::create_dir_all(settings_path.parent().unwrap())?;
            fs::write(&settings_path, serde_json::to_string_pretty(&settings)?)
                .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        }
        Ok(changed)
    }

    fn extract_modified_files(&self, transcript_slice: &[u8]) -> Vec<String> {
        let mut files = Vec::new();
        for value in jsonl(transcript_slice) {
            let Some(blocks) = value["message"]["content"].as_array() else {
                continue;
            };
            for block in blocks {
                if block["type"] != "tool_use" {
                    continue;
                }
                let Some(tool) = block["name"].as_str() else {
                    continue;
                };
                let Some((_, path_key)) = FILE_TOOLS.iter().find(|(name, _)| *name == tool) else {
                    continue;
                };
                if let Some(path) = block["input"][path_key].as_str() {
                    if !files.iter().any(|f| f == path) {
                        files.push(path.to_string());
                    }
                }
            }
        }
        files
    }

    fn extract_prompts(&self, transcript_slice: &[u8]) -> Vec<String> {
        let mut prompts = Vec::new();
        for value in jsonl(transcript_slice) {
            if value["type"] != "user" {
                continue;
            }
            match &value["message"]["content"] {
                Value::String(text) => prompts.push(text.clone()),
                Value::Array(blocks) => {
                    for block in blocks {
                        if block["type"] == "text" {
                            if let Some(text) = block["text"].as_str() {
                                prompts.push(text.to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        prompts
    }

    fn extract_summary(&self, transcript_slice: &[u8]) -> Option<String> {
        jsonl(transcript_slice)
            .into_iter()
            .rev()
            .find(|value| value["type"] == "summary")
            .and_then(|value| value["summary"].as_str().map(String::from))
    }

    fn token_usage(&self, transcript_slice: &[u8]) -> TokenUsage {
        let mut usage = TokenUsage::default();
        for value in jsonl(transcript_slice) {
            let block = &value["message"]["usage"];
            usage.input_tokens += block["input_tokens"].as_u64().unwrap_or(0);
            usage.output_tokens += block["output_tokens"].as_u64().unwrap_or(0);
        }
        usage
    }

    fn chunk_session_artifacts(&self, transcript_slice: &[u8]) -> Vec<SessionArtifact> {
        if transcript_slice.is_empty() {
            return Vec::new();
        }
        transcript_slice
            .chunks(CHUNK_BYTES)
            .enumerate()
            .map(|(index, chunk)| (format!("chunk-{index:03}.jsonl"), chunk.to_vec()))
            .collect()
    }
}

fn jsonl(bytes: &[u8]) -> Vec<Value> {
    bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.trim_ascii().is_empty())
        .filter_map(|line| serde_json::from_slice(line).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> ClaudeAgent {
        ClaudeAgent
    }

    #[test]
    fn test_parse_hook_event_maps_names() {
        let payload = serde_json::json!({
            "hook_event_name": "UserPromptSubmit",
            "session_id": "abc",
            "transcript_path": "/tmp/t.jsonl",
            "prompt": "fix the bug"
        })
        .to_string();

        let event = agent().parse_hook_event("Stop", payload.as_bytes()).unwrap();
        assert_eq!(event.kind, EventKind::TurnStart);
        assert_eq!(event.session_id, "abc");
        assert_eq!(event.session_ref.as_deref(), Some("/tmp/t.jsonl"));
        assert_eq!(event.prompt.as_deref(), Some("fix the bug"));
    }

    #[test]
    fn test_parse_hook_event_falls_back_to_declared_name() {
        let payload = serde_json::json!({"session_id": "abc"}).to_string();
        let event = agent().parse_hook_event("Stop", payload.as_bytes()).unwrap();
        assert_eq!(event.kind, EventKind::TurnEnd);
    }

    #[test]
    fn test_parse_hook_event_rejects_unknown_names() {
        let payload = serde_json::json!({
            "hook_event_name": "PreCompact",
            "session_id": "abc"
        })
        .to_string();
        assert!(agent().parse_hook_event("PreCompact", payload.as_bytes()).is_err());
    }

    #[test]
    fn test_extract_modified_files_finds_write_tools() {
        let transcript = [
            serde_json::json!({"type": "user", "message": {"content": "please edit"}}),
            serde_json::json!({"type": "assistant", "message": {"content": [
                {"type": "text", "text": "working"},
                {"type": "tool_use", "name": "Write", "input": {"file_path": "/repo/a.txt"}},
                {"type": "tool_use", "name": "Bash", "input": {"command": "ls"}},
                {"type": "tool_use", "name": "Edit", "input": {"file_path": "/repo/b.txt"}},
                {"type": "tool_use", "name": "Edit", "input": {"file_path": "/repo/a.txt"}}
            ]}}),
        ]
        .map(|v| v.to_string())
        .join("\n");

        let files = agent().extract_modified_files(transcript.as_bytes());
        assert_eq!(files, ["/repo/a.txt", "/repo/b.txt"]);
    }

    #[test]
    fn test_extract_modified_files_empty_slice() {
        assert!(agent().extract_modified_files(b"").is_empty());
    }

    #[test]
    fn test_extract_prompts_and_summary() {
        let transcript = [
            serde_json::json!({"type": "user", "message": {"content": "first ask"}}),
            serde_json::json!({"type": "summary", "summary": "fixed the parser"}),
        ]
        .map(|v| v.to_string())
        .join("\n");

        let prompts = agent().extract_prompts(transcript.as_bytes());
        assert_eq!(prompts, ["first ask"]);
        assert_eq!(
            agent().extract_summary(transcript.as_bytes()).as_deref(),
            Some("fixed the parser")
        );
    }

    #[test]
    fn test_token_usage_sums_messages() {
        let transcript = [
            serde_json::json!({"message": {"usage": {"input_tokens": 10, "output_tokens": 5}}}),
            serde_json::json!({"message": {"usage": {"input_tokens": 7, "output_tokens": 3}}}),
        ]
        .map(|v| v.to_string())
        .join("\n");

        let usage = agent().token_usage(transcript.as_bytes());
        assert_eq!(usage.input_tokens, 17);
        assert_eq!(usage.output_tokens, 8);
    }

    #[test]
    fn test_install_hooks_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(agent().install_hooks(dir.path()).unwrap());
        assert!(!agent().install_hooks(dir.path()).unwrap());

        let settings: Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join(".claude/settings.json")).unwrap(),
        )
        .unwrap();
        assert!(settings["hooks"]["Stop"].is_array());
        assert_eq!(settings["hooks"]["Stop"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_install_hooks_preserves_foreign_entries() {
        let dir = tempfile::tempdir().unwrap();
        let settings_dir = dir.path().join(".claude");
        fs::create_dir_all(&settings_dir).unwrap();
        fs::write(
            settings_dir.join("settings.json"),
            serde_json::json!({
                "hooks": {"Stop": [{"hooks": [{"type": "command", "command": "my-linter"}]}]},
                "model": "opus"
            })
            .to_string(),
        )
        .unwrap();

        assert!(agent().install_hooks(dir.path()).unwrap());
        let settings: Value = serde_json::from_str(
            &fs::read_to_string(settings_dir.join("settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(settings["model"], "opus");
        assert_eq!(settings["hooks"]["Stop"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_chunk_session_artifacts_splits_large_input() {
        let big = vec![b'x'; CHUNK_BYTES + 10];
        let chunks = agent().chunk_session_artifacts(&big);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].0, "chunk-000.jsonl");
        assert_eq!(chunks[1].1.len(), 10);
        assert!(agent().chunk_session_artifacts(b"").is_empty());
    }
}
