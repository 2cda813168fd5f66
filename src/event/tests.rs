use super::*;
use serde_json::json;

fn user(id: i64) -> TelegramUser {
    TelegramUser {
        id,
        first_name: "Dana".to_string(),
        last_name: Some("Reyes".to_string()),
        username: None,
    }
}

fn chat(id: i64, chat_type: &str) -> TelegramChat {
    TelegramChat {
        id,
        chat_type: chat_type.to_string(),
        title: None,
    }
}

fn message(from: Option<TelegramUser>, chat: Option<TelegramChat>, text: &str) -> TelegramMessage {
    TelegramMessage {
        message_id: 1,
        from,
        chat,
        text: text.to_string(),
        date: 1_707_668_400,
    }
}

#[test]
fn test_command_intent_strips_marker() {
    assert_eq!(detect_intent("/status"), "status");
    assert_eq!(detect_intent("/Fuel 200 liters"), "fuel");
    assert_eq!(detect_intent("  /PREOP now"), "preop");
}

#[test]
fn test_command_intent_is_first_token_only() {
    // Keywords in the arguments never override the command
    assert_eq!(detect_intent("/shutdown urgent fuel"), "shutdown");
    assert_eq!(detect_intent("/"), "");
    assert_eq!(detect_intent("/ status"), "");
}

#[test]
fn test_keyword_intents() {
    assert_eq!(detect_intent("Filled 200 litres this morning"), "fuel_log");
    assert_eq!(detect_intent("pre-op done, all good"), "preop");
    assert_eq!(detect_intent("How is EX-001 doing?"), "status");
    assert_eq!(detect_intent("needs a repair on the bucket"), "maintenance");
    assert_eq!(detect_intent("EMERGENCY on site"), "escalate");
    assert_eq!(detect_intent("change the setting"), "config");
    assert_eq!(detect_intent("halt everything"), "shutdown");
}

#[test]
fn test_keyword_priority_order() {
    // fuel_log is checked before escalate
    assert_eq!(detect_intent("urgent: need fuel"), "fuel_log");
    // status is checked before maintenance
    assert_eq!(detect_intent("service report please"), "status");
    // preop is checked before shutdown
    assert_eq!(detect_intent("stop and do the checklist"), "preop");
}

#[test]
fn test_keyword_table_order_is_fixed() {
    let order: Vec<&str> = INTENT_KEYWORDS.iter().map(|(intent, _)| *intent).collect();
    assert_eq!(
        order,
        vec![
            "fuel_log",
            "preop",
            "status",
            "maintenance",
            "escalate",
            "config",
            "shutdown"
        ]
    );
}

#[test]
fn test_no_keyword_is_general() {
    assert_eq!(detect_intent("hello there"), "general");
    assert_eq!(detect_intent(""), "general");
    assert_eq!(detect_intent("   "), "general");
}

#[test]
fn test_callback_intents() {
    assert_eq!(detect_intent_from_callback("fuel:200"), "fuel_log");
    assert_eq!(detect_intent_from_callback("  PREOP_start "), "preop");
    assert_eq!(detect_intent_from_callback("confirm_yes"), "general");
    assert_eq!(detect_intent_from_callback("cancel"), "general");
    assert_eq!(detect_intent_from_callback("escalate:now"), "escalate");
    assert_eq!(detect_intent_from_callback("page_2"), "callback");
    assert_eq!(detect_intent_from_callback(""), "callback");
}

#[test]
fn test_classify_private_message() {
    let update = TelegramUpdate {
        message: Some(message(Some(user(42)), Some(chat(42, "private")), "/status")),
        ..Default::default()
    };

    let classified = classify(&update);
    assert_eq!(classified.sender.map(|u| u.id), Some(42));
    assert_eq!(classified.intent, "status");
    assert_eq!(classified.channel, ChannelClass::Private);
    assert_eq!(classified.kind, EventKind::Message);
    assert_eq!(classified.group_id, Some(42));
}

#[test]
fn test_classify_message_without_chat_defaults_private() {
    let update = TelegramUpdate {
        message: Some(message(Some(user(1)), None, "refuel done")),
        ..Default::default()
    };

    let classified = classify(&update);
    assert_eq!(classified.channel, ChannelClass::Private);
    assert_eq!(classified.intent, "fuel_log");
    assert_eq!(classified.group_id, None);
}

#[test]
fn test_message_takes_precedence_over_edited() {
    let update = TelegramUpdate {
        message: Some(message(Some(user(1)), Some(chat(-100, "group")), "/status")),
        edited_message: Some(message(Some(user(2)), Some(chat(-200, "private")), "/config")),
        ..Default::default()
    };

    let classified = classify(&update);
    assert_eq!(classified.kind, EventKind::Message);
    assert_eq!(classified.sender.map(|u| u.id), Some(1));
    assert_eq!(classified.group_id, Some(-100));
}

#[test]
fn test_message_without_sender_falls_through_to_edited() {
    let update = TelegramUpdate {
        message: Some(message(None, Some(chat(-100, "group")), "/status")),
        edited_message: Some(message(Some(user(2)), Some(chat(-100, "group")), "/config")),
        ..Default::default()
    };

    let classified = classify(&update);
    assert_eq!(classified.kind, EventKind::EditedMessage);
    assert_eq!(classified.intent, "config");
}

#[test]
fn test_classify_callback_query() {
    let update = TelegramUpdate {
        callback_query: Some(CallbackQuery {
            id: "cb1".to_string(),
            from: Some(user(7)),
            message: Some(message(None, Some(chat(-300, "supergroup")), "")),
            data: "maintenance:ack".to_string(),
        }),
        ..Default::default()
    };

    let classified = classify(&update);
    assert_eq!(classified.kind, EventKind::CallbackQuery);
    assert_eq!(classified.intent, "maintenance");
    assert_eq!(classified.channel, ChannelClass::Supergroup);
    assert_eq!(classified.group_id, Some(-300));
}

#[test]
fn test_callback_without_message_is_private() {
    let update = TelegramUpdate {
        callback_query: Some(CallbackQuery {
            id: "cb2".to_string(),
            from: Some(user(7)),
            message: None,
            data: "status".to_string(),
        }),
        ..Default::default()
    };

    let classified = classify(&update);
    assert_eq!(classified.channel, ChannelClass::Private);
    assert_eq!(classified.group_id, None);
}

#[test]
fn test_classify_inline_query() {
    let empty = TelegramUpdate {
        inline_query: Some(InlineQuery {
            id: "iq".to_string(),
            from: Some(user(9)),
            query: String::new(),
        }),
        ..Default::default()
    };
    let classified = classify(&empty);
    assert_eq!(classified.intent, "inline_query");
    assert_eq!(classified.channel, ChannelClass::Private);
    assert_eq!(classified.group_id, None);

    let with_text = TelegramUpdate {
        inline_query: Some(InlineQuery {
            id: "iq".to_string(),
            from: Some(user(9)),
            query: "status of EX-001".to_string(),
        }),
        ..Default::default()
    };
    assert_eq!(classify(&with_text).intent, "status");
}

#[test]
fn test_channel_post_has_no_sender() {
    let update = TelegramUpdate {
        channel_post: Some(message(Some(user(5)), Some(chat(-500, "channel")), "fuel")),
        ..Default::default()
    };

    let classified = classify(&update);
    assert!(classified.sender.is_none());
    assert_eq!(classified.intent, "channel_post");
    assert_eq!(classified.channel, ChannelClass::Channel);
    assert_eq!(classified.kind, EventKind::ChannelPost);
    assert_eq!(classified.group_id, Some(-500));
}

#[test]
fn test_empty_update_is_unknown() {
    let classified = classify(&TelegramUpdate::default());
    assert!(classified.sender.is_none());
    assert_eq!(classified.intent, "unknown");
    assert_eq!(classified.channel, ChannelClass::Unknown);
    assert_eq!(classified.kind, EventKind::Unknown);
    assert_eq!(classified.group_id, None);
}

#[test]
fn test_update_deserializes_from_wire_json() {
    let raw = json!({
        "update_id": 1001,
        "message": {
            "message_id": 5,
            "from": {"id": 123456, "first_name": "Sam"},
            "chat": {"id": -100123, "type": "group", "title": "EX-001"},
            "text": "Fuel: 300L",
            "date": 1707668400
        }
    });

    let update: TelegramUpdate = serde_json::from_value(raw).unwrap();
    let classified = classify(&update);
    assert_eq!(classified.sender.unwrap().display_name(), "Sam");
    assert_eq!(classified.intent, "fuel_log");
    assert_eq!(classified.channel, ChannelClass::Group);
    assert_eq!(classified.group_id, Some(-100123));
}

#[test]
fn test_unrecognized_chat_type() {
    assert_eq!(ChannelClass::parse("sender"), ChannelClass::Unknown);
    assert_eq!(ChannelClass::parse(""), ChannelClass::Unknown);
    assert_eq!(ChannelClass::Supergroup.to_string(), "supergroup");
}
