//! Bot API wire types (only the fields the relay reads).

use serde::Deserialize;

use booru_core::domain::{ChatId, MessageId, ReplyTarget};

/// Generic Bot API envelope.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    #[serde(rename = "update_id")]
    pub id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
}

impl Update {
    pub fn kind(&self) -> &'static str {
        match (&self.message, &self.inline_query) {
            (Some(_), _) => "message",
            (None, Some(_)) => "inline_query",
            (None, None) => "other",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    /// Reply into the same chat, quoting this message.
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget::new(ChatId(self.chat.id), Some(MessageId(self.message_id)))
    }

    pub fn sender_first_name(&self) -> &str {
        self.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("")
    }

    pub fn sender_username(&self) -> &str {
        self.from
            .as_ref()
            .and_then(|u| u.username.as_deref())
            .unwrap_or("")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
}

/// A `/command` and whatever follows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub argument: String,
}

/// Split `/cmd@botname rest of text` into a lowercased name and the trimmed rest.
pub fn parse_command(text: &str) -> Option<CommandInvocation> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let argument = parts.next().unwrap_or("").trim().to_string();

    let name = first[1..].split('@').next().unwrap_or("").to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(CommandInvocation { name, argument })
}
