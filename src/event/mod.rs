use serde::{Deserialize, Serialize};
use std::fmt;

mod classify;
#[cfg(test)]
mod tests;

pub use classify::{
    classify, detect_intent, detect_intent_from_callback, ClassifiedEvent, CALLBACK_INTENTS,
    INTENT_KEYWORDS,
};

/// Well-known intent names produced by the classifier.
pub mod intent {
    pub const FUEL_LOG: &str = "fuel_log";
    pub const PREOP: &str = "preop";
    pub const STATUS: &str = "status";
    pub const MAINTENANCE: &str = "maintenance";
    pub const ESCALATE: &str = "escalate";
    pub const CONFIG: &str = "config";
    pub const SHUTDOWN: &str = "shutdown";
    pub const GENERAL: &str = "general";
    pub const CALLBACK: &str = "callback";
    pub const INLINE_QUERY: &str = "inline_query";
    pub const CHANNEL_POST: &str = "channel_post";
    pub const UNKNOWN: &str = "unknown";
}

/// Incoming chat-platform webhook update.
///
/// Exactly one of the optional fields is normally present; the classifier
/// applies a fixed precedence when more than one is.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<TelegramMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<TelegramMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<InlineQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<TelegramMessage>,
}

/// Inline keyboard button press
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TelegramUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InlineQuery {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub query: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelegramMessage {
    #[serde(default)]
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TelegramUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<TelegramChat>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub date: i64,
}

/// Sender of an update. `id` is the stable platform user id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl TelegramUser {
    /// "First Last" for log lines
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    /// "private", "group", "supergroup" or "channel"
    #[serde(rename = "type", default)]
    pub chat_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Channel class of the chat an update arrived in.
///
/// Compared against the `allowed_channels` entries of the permission matrix
/// through [`ChannelClass::as_str`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelClass {
    Private,
    Group,
    Supergroup,
    Channel,
    Unknown,
}

impl ChannelClass {
    pub fn parse(chat_type: &str) -> Self {
        match chat_type {
            "private" => ChannelClass::Private,
            "group" => ChannelClass::Group,
            "supergroup" => ChannelClass::Supergroup,
            "channel" => ChannelClass::Channel,
            _ => ChannelClass::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelClass::Private => "private",
            ChannelClass::Group => "group",
            ChannelClass::Supergroup => "supergroup",
            ChannelClass::Channel => "channel",
            ChannelClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChannelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the update the classification was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Message,
    EditedMessage,
    CallbackQuery,
    InlineQuery,
    ChannelPost,
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::EditedMessage => "edited_message",
            EventKind::CallbackQuery => "callback_query",
            EventKind::InlineQuery => "inline_query",
            EventKind::ChannelPost => "channel_post",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
