//! Prompt assembly.
//!
//! Two encodings of the same conversation are produced here:
//!
//! - [`build_prompt`] flattens the system instruction and every turn into a
//!   single text block for backends that only complete free text.
//! - [`build_messages`] keeps the turns structured and prepends the
//!   instruction as a `system` message for chat-aware backends.
//!
//! [`split_system`] undoes [`build_messages`] so a text-only backend can
//! accept the structured form.

use std::path::Path;

use tracing::debug;

use crate::message::{Message, Role};

/// Instruction used when neither a persona nor the instruction file is available.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are the satirical 'Ideas Guy': overconfident, \
rapid-fire ideas, but ultimately helpful and safe.";

const ASSISTANT_CUE: &str = "Assistant:";

/// Read the default instruction from `path`, trimmed.
///
/// A missing or unreadable file yields [`DEFAULT_SYSTEM_PROMPT`].
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text.trim().to_owned(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "instruction file unavailable; using built-in default");
            DEFAULT_SYSTEM_PROMPT.to_owned()
        }
    }
}

/// Flatten a conversation into a single completion prompt.
///
/// The result always ends with a line starting with `Assistant:` so the
/// backend continues the assistant's turn.
pub fn build_prompt(system_prompt: &str, messages: &[Message]) -> String {
    let preface =
        format!("System:\n{system_prompt}\n\nConversation (continue as the Assistant):\n");

    let mut lines: Vec<String> = messages
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), m.content.trim()))
        .collect();

    if lines.last().is_none_or(|l| !l.starts_with(ASSISTANT_CUE)) {
        lines.push(ASSISTANT_CUE.to_owned());
    }

    preface + &lines.join("\n")
}

/// Prepend the instruction as a `system` turn, leaving the caller's turns untouched.
pub fn build_messages(system_prompt: &str, messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(Message::system(system_prompt));
    out.extend_from_slice(messages);
    out
}

/// Separate the leading `system` turns from the rest of the conversation.
///
/// Leading system contents are joined with a blank line. Later system turns
/// stay in the conversation.
pub fn split_system(messages: &[Message]) -> (String, &[Message]) {
    let n = messages
        .iter()
        .take_while(|m| m.role == Role::System)
        .count();
    let instruction = messages[..n]
        .iter()
        .map(|m| m.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    (instruction, &messages[n..])
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::System | Role::Assistant => "Assistant",
    }
}
