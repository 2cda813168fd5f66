use super::{
    intent, ChannelClass, EventKind, TelegramChat, TelegramMessage, TelegramUpdate, TelegramUser,
};

/// Keyword table for free-text intent detection.
///
/// Order is the tie-break: the first intent with a matching keyword wins, so
/// "urgent fuel top-up" resolves to `fuel_log`, not `escalate`.
pub const INTENT_KEYWORDS: &[(&str, &[&str])] = &[
    (intent::FUEL_LOG, &["fuel", "filled", "liters", "litres", "refuel"]),
    (
        intent::PREOP,
        &["preop", "pre-op", "prestart", "checklist", "inspection"],
    ),
    (intent::STATUS, &["status", "how is", "report"]),
    (intent::MAINTENANCE, &["maintenance", "service", "repair"]),
    (
        intent::ESCALATE,
        &["escalate", "urgent", "emergency", "supervisor"],
    ),
    (intent::CONFIG, &["config", "setting", "configure"]),
    (intent::SHUTDOWN, &["shutdown", "stop", "halt"]),
];

/// Callback data prefix -> intent, checked in order.
pub const CALLBACK_INTENTS: &[(&str, &str)] = &[
    ("fuel", intent::FUEL_LOG),
    ("preop", intent::PREOP),
    ("status", intent::STATUS),
    ("confirm", intent::GENERAL),
    ("cancel", intent::GENERAL),
    ("maintenance", intent::MAINTENANCE),
    ("escalate", intent::ESCALATE),
];

/// Normalized view of an update used for routing and authorization.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedEvent {
    /// None when the update has no reliable sender (channel posts, unknown kinds)
    pub sender: Option<TelegramUser>,
    pub intent: String,
    pub channel: ChannelClass,
    pub kind: EventKind,
    /// Chat the update belongs to, used for group-binding lookups
    pub group_id: Option<i64>,
}

/// Classify an update into (sender, intent, channel class, kind).
///
/// Precedence: message > edited message > callback query > inline query >
/// channel post. A kind is only picked when it carries a sender, except for
/// channel posts which never do.
pub fn classify(update: &TelegramUpdate) -> ClassifiedEvent {
    let group_id = extract_group_id(update);

    if let Some((msg, from)) = with_sender(update.message.as_ref()) {
        return ClassifiedEvent {
            sender: Some(from.clone()),
            intent: detect_intent(&msg.text),
            channel: channel_of(msg.chat.as_ref()),
            kind: EventKind::Message,
            group_id,
        };
    }

    if let Some((msg, from)) = with_sender(update.edited_message.as_ref()) {
        return ClassifiedEvent {
            sender: Some(from.clone()),
            intent: detect_intent(&msg.text),
            channel: channel_of(msg.chat.as_ref()),
            kind: EventKind::EditedMessage,
            group_id,
        };
    }

    if let Some(cb) = &update.callback_query {
        if let Some(from) = &cb.from {
            let chat = cb.message.as_ref().and_then(|m| m.chat.as_ref());
            return ClassifiedEvent {
                sender: Some(from.clone()),
                intent: detect_intent_from_callback(&cb.data),
                channel: channel_of(chat),
                kind: EventKind::CallbackQuery,
                group_id,
            };
        }
    }

    if let Some(iq) = &update.inline_query {
        if let Some(from) = &iq.from {
            let intent = if iq.query.is_empty() {
                intent::INLINE_QUERY.to_string()
            } else {
                detect_intent(&iq.query)
            };
            // Inline queries are always issued from a private context
            return ClassifiedEvent {
                sender: Some(from.clone()),
                intent,
                channel: ChannelClass::Private,
                kind: EventKind::InlineQuery,
                group_id,
            };
        }
    }

    // Channel posts may come from anonymous admins: no sender
    if let Some(post) = &update.channel_post {
        return ClassifiedEvent {
            sender: None,
            intent: intent::CHANNEL_POST.to_string(),
            channel: channel_of(post.chat.as_ref()),
            kind: EventKind::ChannelPost,
            group_id,
        };
    }

    ClassifiedEvent {
        sender: None,
        intent: intent::UNKNOWN.to_string(),
        channel: ChannelClass::Unknown,
        kind: EventKind::Unknown,
        group_id,
    }
}

/// Detect intent from free text.
///
/// `/command args` yields `command`; otherwise the first keyword category
/// in [`INTENT_KEYWORDS`] order, falling back to `general`.
pub fn detect_intent(text: &str) -> String {
    let text = text.trim().to_lowercase();

    if text.starts_with('/') {
        let token = text.split_whitespace().next().unwrap_or_default();
        return token.strip_prefix('/').unwrap_or(token).to_string();
    }

    INTENT_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(intent, _)| intent.to_string())
        .unwrap_or_else(|| intent::GENERAL.to_string())
}

/// Detect intent from inline keyboard callback data by prefix.
pub fn detect_intent_from_callback(data: &str) -> String {
    let normalized = data.trim().to_lowercase();
    if normalized.is_empty() {
        return intent::CALLBACK.to_string();
    }

    CALLBACK_INTENTS
        .iter()
        .find(|(prefix, _)| normalized.starts_with(prefix))
        .map(|(_, intent)| intent.to_string())
        .unwrap_or_else(|| intent::CALLBACK.to_string())
}

fn with_sender(msg: Option<&TelegramMessage>) -> Option<(&TelegramMessage, &TelegramUser)> {
    let msg = msg?;
    let from = msg.from.as_ref()?;
    Some((msg, from))
}

/// Missing chat info is treated as a private conversation.
fn channel_of(chat: Option<&TelegramChat>) -> ChannelClass {
    chat.map(|c| ChannelClass::parse(&c.chat_type))
        .unwrap_or(ChannelClass::Private)
}

/// Chat id of the update, regardless of whether a sender is present.
fn extract_group_id(update: &TelegramUpdate) -> Option<i64> {
    let chat_of = |m: Option<&TelegramMessage>| m.and_then(|m| m.chat.as_ref()).map(|c| c.id);

    chat_of(update.message.as_ref())
        .or_else(|| chat_of(update.edited_message.as_ref()))
        .or_else(|| {
            update
                .callback_query
                .as_ref()
                .and_then(|cb| chat_of(cb.message.as_ref()))
        })
        .or_else(|| chat_of(update.channel_post.as_ref()))
}
