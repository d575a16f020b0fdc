//! Per-message metadata: service descriptions, reply linkage, reactions,
//! media skip reasons, sender and date labels, and topic membership.
//!
//! Every function here is a pure projection of one [`RawMessage`].

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::config::MediaConfig;
use crate::core::media::{media_size, media_type_of};
use crate::core::models::{DEFAULT_TOPIC_ID, Reaction};
use crate::message::{RawMessage, Sender, ServiceAction};

/// Human-readable description of a service action.
///
/// ```rust
/// use chatarchive::core::references::service_description;
/// use chatarchive::message::ServiceAction;
///
/// assert_eq!(service_description(&ServiceAction::PinMessage), "Message pinned");
/// assert_eq!(
///     service_description(&ServiceAction::ChatEditTitle { title: "Rustaceans".into() }),
///     r#"Chat title changed: "Rustaceans""#
/// );
/// assert_eq!(
///     service_description(&ServiceAction::Other("boost_apply".into())),
///     "Service message: boost_apply"
/// );
/// ```
pub fn service_description(action: &ServiceAction) -> String {
    let base = match action {
        ServiceAction::ChatAddUser => "User added to the chat",
        ServiceAction::ChatDeleteUser => "User left the chat",
        ServiceAction::ChatJoinedByLink => "User joined via invite link",
        ServiceAction::ChatEditTitle { title } => return format!(r#"Chat title changed: "{title}""#),
        ServiceAction::ChatEditPhoto => "Chat photo changed",
        ServiceAction::ChatDeletePhoto => "Chat photo removed",
        ServiceAction::ChatCreate => "Chat created",
        ServiceAction::ChannelCreate => "Channel created",
        ServiceAction::ChatMigrateTo => "Chat upgraded to a supergroup",
        ServiceAction::ChannelMigrateFrom => "Supergroup created from a chat",
        ServiceAction::PinMessage => "Message pinned",
        ServiceAction::HistoryClear => "History cleared",
        ServiceAction::GameScore => "Game score",
        ServiceAction::PaymentSent => "Payment sent",
        ServiceAction::PhoneCall => "Call",
        ServiceAction::ScreenshotTaken => "Screenshot taken",
        ServiceAction::CustomAction { message } => return format!(r#"Custom action: "{message}""#),
        ServiceAction::BotAllowed => "Bot allowed",
        ServiceAction::SecureValuesSent => "Secure values sent",
        ServiceAction::ContactSignUp => "User signed up",
        ServiceAction::GeoProximityReached => "Location proximity reached",
        ServiceAction::GroupCall => "Group call",
        ServiceAction::InviteToGroupCall => "Invited to a group call",
        ServiceAction::SetMessagesTtl => "Auto-delete timer set",
        ServiceAction::GroupCallScheduled => "Group call scheduled",
        ServiceAction::SetChatTheme => "Chat theme changed",
        ServiceAction::ChatJoinedByRequest => "User admitted by join request",
        ServiceAction::WebViewDataSent => "Data sent from a web app",
        ServiceAction::GiftPremium => "Premium subscription gifted",
        ServiceAction::TopicCreate => "Forum topic created",
        ServiceAction::TopicEdit => "Forum topic edited",
        ServiceAction::Other(kind) => return format!("Service message: {kind}"),
    };
    base.to_string()
}

/// `(is_service, description)` for a message.
pub fn classify_service(msg: &RawMessage) -> (bool, String) {
    match &msg.action {
        Some(action) => (true, service_description(action)),
        None => (false, String::new()),
    }
}

/// Reply target of a message, if it is recognized as a reply.
///
/// In forum chats every topic post carries a reply header pointing at the
/// topic root; only headers that also carry the top id are real replies.
pub fn reply_target(msg: &RawMessage) -> Option<u64> {
    let header = msg.reply_to?;
    let target = header.reply_to_msg_id?;
    if header.forum_topic && header.reply_to_top_id.is_none() {
        return None;
    }
    Some(target)
}

/// Reactions with an emoticon and a positive count, in received order.
pub fn extract_reactions(msg: &RawMessage) -> Vec<Reaction> {
    let reactions: Vec<Reaction> = msg
        .reactions
        .iter()
        .filter_map(|r| {
            let emoticon = r.emoticon.as_deref().filter(|e| !e.is_empty())?;
            let count = u64::try_from(r.count).ok().filter(|&c| c > 0)?;
            Some(Reaction {
                emoticon: emoticon.to_string(),
                count,
            })
        })
        .collect();
    if !msg.reactions.is_empty() {
        debug!(
            message_id = msg.id,
            received = msg.reactions.len(),
            kept = reactions.len(),
            "extracted reactions"
        );
    }
    reactions
}

/// Why a message's media is not downloaded, if it isn't.
///
/// Returns `None` for messages without media and for media within policy.
pub fn skip_reason(msg: &RawMessage, config: &MediaConfig) -> Option<String> {
    let media = msg.media.as_ref()?;
    let media_type = media_type_of(media);

    if config.skip_media_types.contains(&media_type) {
        return Some(format!("contains {media_type}"));
    }

    let size = media_size(media);
    if size > config.max_file_size_bytes() {
        let mb = size as f64 / (1024.0 * 1024.0);
        return Some(format!("file size {mb:.1}MB > {}MB", config.max_file_size_mb));
    }

    None
}

/// Sender label: name, id and username when known.
pub fn sender_label(sender: Option<&Sender>) -> String {
    match sender {
        None => "Unknown".to_string(),
        Some(Sender {
            id,
            name,
            username: Some(username),
        }) if !username.is_empty() => format!("{name} (ID: {id}, @{username})"),
        Some(Sender { id, name, .. }) => format!("{name} (ID: {id})"),
    }
}

/// Formats a UTC instant in `tz` with a strftime-style `format`.
///
/// Falls back to RFC 3339 if the format string is invalid.
pub fn format_date(date: DateTime<Utc>, tz: Tz, format: &str) -> String {
    let local = date.with_timezone(&tz);
    let mut out = String::new();
    if is_valid_date_format(format) && write!(out, "{}", local.format(format)).is_ok() {
        out
    } else {
        local.to_rfc3339()
    }
}

/// Returns `true` if chrono accepts every specifier in `format`.
pub fn is_valid_date_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// Topic a message belongs to.
///
/// Flat chats have a single topic. In forums a post carries its topic in the
/// reply header; the topic-creation message is the topic's root and its id
/// is the topic id. Anything else lives in the default topic.
pub fn topic_of(msg: &RawMessage, is_forum: bool) -> u64 {
    if !is_forum {
        return DEFAULT_TOPIC_ID;
    }
    if matches!(msg.action, Some(ServiceAction::TopicCreate)) {
        return msg.id;
    }
    match msg.reply_to {
        Some(header) if header.forum_topic => header
            .reply_to_top_id
            .or(header.reply_to_msg_id)
            .unwrap_or(DEFAULT_TOPIC_ID),
        _ => DEFAULT_TOPIC_ID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media::MediaType;
    use crate::message::{DocumentMedia, MediaPayload, ReactionCount, ReplyHeader};
    use chrono::TimeZone;

    fn msg(id: u64) -> RawMessage {
        RawMessage::new(id, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
    }

    #[test]
    fn test_service_classification() {
        assert_eq!(classify_service(&msg(1)), (false, String::new()));
        let (is_service, desc) =
            classify_service(&msg(2).with_action(ServiceAction::CustomAction { message: "hi".into() }));
        assert!(is_service);
        assert_eq!(desc, r#"Custom action: "hi""#);
        assert_eq!(service_description(&ServiceAction::TopicCreate), "Forum topic created");
    }

    #[test]
    fn test_reply_flat_chat() {
        assert_eq!(reply_target(&msg(5).with_reply(ReplyHeader::to(3))), Some(3));
        assert_eq!(reply_target(&msg(5)), None);
    }

    #[test]
    fn test_reply_forum_requires_top_id() {
        assert_eq!(reply_target(&msg(5).with_reply(ReplyHeader::in_topic(2))), None);
        assert_eq!(reply_target(&msg(5).with_reply(ReplyHeader::in_topic_to(2, 4))), Some(4));
    }

    #[test]
    fn test_reactions_filtered_in_order() {
        let mut m = msg(1).with_reaction("🔥", 4).with_reaction("👍", 0);
        m.reactions.push(ReactionCount {
            emoticon: None,
            count: 9,
        });
        m = m.with_reaction("❤", 2).with_reaction("😢", -1);

        let reactions = extract_reactions(&m);
        let pairs: Vec<(&str, u64)> = reactions.iter().map(|r| (r.emoticon.as_str(), r.count)).collect();
        assert_eq!(pairs, vec![("🔥", 4), ("❤", 2)]);
    }

    #[test]
    fn test_skip_reason() {
        let mut config = MediaConfig::default();
        config.skip_media_types.insert(MediaType::Photo);
        config.max_file_size_mb = 1;

        let photo = msg(1).with_media(MediaPayload::photo());
        assert_eq!(skip_reason(&photo, &config).as_deref(), Some("contains photo"));

        let big = msg(2).with_media(DocumentMedia::new().with_size(3 * 1024 * 1024 / 2).into());
        assert_eq!(skip_reason(&big, &config).as_deref(), Some("file size 1.5MB > 1MB"));

        let small = msg(3).with_media(DocumentMedia::new().with_size(10).into());
        assert_eq!(skip_reason(&small, &config), None);
        assert_eq!(skip_reason(&msg(4), &config), None);
    }

    #[test]
    fn test_sender_label() {
        assert_eq!(sender_label(None), "Unknown");
        let alice = Sender::new(42, "Alice");
        assert_eq!(sender_label(Some(&alice)), "Alice (ID: 42)");
        let alice = alice.with_username("alice");
        assert_eq!(sender_label(Some(&alice)), "Alice (ID: 42, @alice)");
    }

    #[test]
    fn test_format_date_timezone() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(
            format_date(date, chrono_tz::Europe::Moscow, "%Y-%m-%d %H:%M:%S"),
            "2024-01-15 13:30:00"
        );
        assert_eq!(format_date(date, chrono_tz::UTC, "%d.%m.%Y"), "15.01.2024");
    }

    #[test]
    fn test_format_date_invalid_format_falls_back() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert!(!is_valid_date_format("%Q"));
        assert_eq!(format_date(date, chrono_tz::UTC, "%Q"), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_topic_of() {
        let plain = msg(10);
        assert_eq!(topic_of(&plain, false), DEFAULT_TOPIC_ID);
        assert_eq!(topic_of(&plain, true), DEFAULT_TOPIC_ID);

        let post = msg(11).with_reply(ReplyHeader::in_topic(7));
        assert_eq!(topic_of(&post, true), 7);
        assert_eq!(topic_of(&post, false), DEFAULT_TOPIC_ID);

        let answer = msg(12).with_reply(ReplyHeader::in_topic_to(7, 11));
        assert_eq!(topic_of(&answer, true), 7);

        let root = msg(7).with_action(ServiceAction::TopicCreate);
        assert_eq!(topic_of(&root, true), 7);

        let flat_reply = msg(13).with_reply(ReplyHeader::to(10));
        assert_eq!(topic_of(&flat_reply, true), DEFAULT_TOPIC_ID);
    }
}
