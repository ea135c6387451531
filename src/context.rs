//! Conversation trimming.

use crate::llm::{ChatMessage, Role};

/// Trailing window kept for long-running conversations.
pub const CONTEXT_WINDOW_MESSAGES: usize = 30;

/// Trim `messages` to the system prompt plus a suffix starting at an
/// assistant turn.
///
/// The suffix begins at the first assistant message inside the last
/// `max_messages`, so no tool result is ever separated from the call that
/// produced it. System messages inside the window are dropped. When the
/// window holds no assistant message the whole window is kept.
pub fn cut_off_context(messages: Vec<ChatMessage>, max_messages: usize) -> Vec<ChatMessage> {
    if messages.len() <= max_messages {
        return messages;
    }

    let mut iter = messages.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let rest: Vec<ChatMessage> = iter.collect();

    let window_start = rest.len().saturating_sub(max_messages);
    let window = &rest[window_start..];
    let anchor = window
        .iter()
        .position(|m| m.role == Role::Assistant)
        .unwrap_or(0);

    let mut trimmed = Vec::with_capacity(window.len() - anchor + 1);
    trimmed.push(first);
    trimmed.extend(
        window[anchor..]
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    trimmed
}
