//! Line-oriented access to agent transcripts.
//!
//! Transcripts are JSONL files written by the agent. The engine only needs
//! a line position to use as a cursor, byte slices between positions, and a
//! lenient parse; malformed lines are agent-side artifacts and are skipped.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Number of lines in the transcript. A missing file counts as zero lines;
/// a trailing chunk without a newline still counts as one. No JSON parsing
/// happens here.
pub fn line_count(path: &Path) -> Result<u64> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    Ok(count_lines(&bytes))
}

/// Bytes from line `start` (zero-based) onward. Missing file or a start
/// past the end yields an empty slice.
pub fn slice_from_line(path: &Path, start: u64) -> Result<Vec<u8>> {
    slice_lines(path, start, u64::MAX)
}

/// Bytes covering lines `[start, end)`. Bounds past the end are clamped.
pub fn slice_lines(path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
    if start >= end {
        return Ok(Vec::new());
    }
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let begin = match offset_of_line(&bytes, start) {
        Some(offset) => offset,
        None => return Ok(Vec::new()),
    };
    let stop = offset_of_line(&bytes, end).unwrap_or(bytes.len());
    Ok(bytes[begin..stop].to_vec())
}

/// Parse JSONL bytes, silently dropping lines that are not valid JSON.
pub fn parse_lines(bytes: &[u8]) -> Vec<serde_json::Value> {
    bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.trim_ascii().is_empty())
        .filter_map(|line| serde_json::from_slice(line).ok())
        .collect()
}

/// Render values back to JSONL, one compact document per line.
pub fn serialize_lines(values: &[serde_json::Value]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        // Compact encoding of a value that came in as a single line cannot
        // itself contain a newline.
        out.extend_from_slice(value.to_string().as_bytes());
        out.push(b'\n');
    }
    out
}

fn count_lines(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|&&b| b == b'\n').count() as u64;
    if bytes.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Byte offset where line `n` starts, `None` when the file has fewer lines.
fn offset_of_line(bytes: &[u8], n: u64) -> Option<usize> {
    if n == 0 {
        return if bytes.is_empty() { None } else { Some(0) };
    }
    let mut seen = 0u64;
    for (idx, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            seen += 1;
            if seen == n {
                return if idx + 1 < bytes.len() {
                    Some(idx + 1)
                } else {
                    None
                };
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn transcript(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_line_count_missing_file_is_zero() {
        assert_eq!(line_count(Path::new("/nonexistent/t.jsonl")).unwrap(), 0);
    }

    #[test]
    fn test_line_count_counts_terminated_lines() {
        let file = transcript(&[r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#]);
        assert_eq!(line_count(file.path()).unwrap(), 3);
    }

    #[test]
    fn test_line_count_unterminated_tail_counts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"n\":1}\n{\"n\":2}").unwrap();
        file.flush().unwrap();
        assert_eq!(line_count(file.path()).unwrap(), 2);
    }

    #[test]
    fn test_slice_from_line() {
        let file = transcript(&[r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#]);
        let slice = slice_from_line(file.path(), 1).unwrap();
        assert_eq!(slice, b"{\"n\":2}\n{\"n\":3}\n");
    }

    #[test]
    fn test_slice_lines_window() {
        let file = transcript(&[r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#]);
        let slice = slice_lines(file.path(), 1, 2).unwrap();
        assert_eq!(slice, b"{\"n\":2}\n");
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let file = transcript(&[r#"{"n":1}"#]);
        assert!(slice_from_line(file.path(), 5).unwrap().is_empty());
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let bytes = b"{\"ok\":1}\nnot json at all\n{\"ok\":2}\n";
        let values = parse_lines(bytes);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["ok"], 1);
        assert_eq!(values[1]["ok"], 2);
    }

    #[test]
    fn test_parse_serialize_round_trip() {
        let values = vec![
            serde_json::json!({"type": "user", "n": 1}),
            serde_json::json!({"type": "assistant", "n": 2}),
        ];
        let bytes = serialize_lines(&values);
        assert_eq!(parse_lines(&bytes), values);
    }
}
