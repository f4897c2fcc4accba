use serde::{Deserialize, Serialize};

use crate::core::ids;

/// Epoch milliseconds, the unit every persisted timestamp uses.
pub type Timestamp = i64;

pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// An inline image carried alongside a message.
///
/// `data` is the base64 payload without any `data:` URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "is_false")]
    is_streaming: bool,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: ids::generate(),
            role,
            content: content.into(),
            is_streaming: false,
            timestamp: now_millis(),
            attachment: None,
        }
    }

    pub fn user(content: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            attachment,
            ..Self::new(Role::User, content)
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }

    /// An empty model reply that accepts fragments until finished.
    pub fn placeholder() -> Self {
        Self {
            is_streaming: true,
            ..Self::new(Role::Model, String::new())
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    /// Appends a fragment. Returns false once the message is frozen.
    pub fn push_fragment(&mut self, fragment: &str) -> bool {
        if !self.is_streaming {
            return false;
        }
        self.content.push_str(fragment);
        true
    }

    /// Freezes the message; streaming never resumes afterwards.
    pub fn finish(&mut self) {
        self.is_streaming = false;
    }

    /// Messages that carry neither text nor an image are never sent upstream.
    pub fn has_payload(&self) -> bool {
        !self.content.is_empty() || self.attachment.is_some()
    }
}
