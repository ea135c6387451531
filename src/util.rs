//! Shared utility functions used across the codebase.

use std::path::{Path, PathBuf};

/// Prefix of tool results telling the model its call could not be applied.
pub const WRONG_TOOL_CALL_WORD: &str = "Wrong tool call. ";

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// everything else maps to `false`.
pub fn env_var_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}

/// Join a model-provided path onto the working directory.
///
/// Models often write project paths as `/src/app.py`; a leading slash is
/// treated as relative to `work_dir`, never as the filesystem root.
pub fn join_paths(work_dir: &Path, path: &str) -> PathBuf {
    let trimmed = path.trim().trim_start_matches('/');
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed.is_empty() {
        work_dir.to_path_buf()
    } else {
        work_dir.join(trimmed)
    }
}

/// Record a usage event. Silent when `TELEMETRY_DISABLED` is set.
pub fn telemetry_event(event_name: &str) {
    if env_var_bool("TELEMETRY_DISABLED", false) {
        return;
    }
    tracing::info!(target: "clean_coder::telemetry", event = event_name, "usage event");
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
