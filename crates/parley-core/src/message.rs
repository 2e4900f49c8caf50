//! Conversation turns.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Author of a conversation turn.
///
/// Deserializing never fails on the role: any label other than the three
/// known ones becomes [`Role::User`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

impl Role {
    /// Map a raw role label to a [`Role`], coercing unknown labels to `User`.
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

impl From<String> for Role {
    fn from(label: String) -> Self {
        Role::parse(&label)
    }
}

impl From<&str> for Role {
    fn from(label: &str) -> Self {
        Role::parse(label)
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_roles_become_user() {
        assert_eq!(Role::parse("narrator"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
        assert_eq!(Role::parse("Assistant"), Role::User);
        assert_eq!(Role::parse(" assistant "), Role::Assistant);
    }

    #[test]
    fn deserialize_coerces_role_and_defaults_content() {
        let m: Message = serde_json::from_str(r#"{"role":"tool"}"#).unwrap();
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content, "");

        let m: Message = serde_json::from_str(r#"{"role":"system","content":"hi"}"#).unwrap();
        assert_eq!(m, Message::system("hi"));
    }

    #[test]
    fn serialize_uses_lowercase_labels() {
        let json = serde_json::to_value(Message::assistant("ok")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.as_ref(), "user");
    }
}
