//! Raw message records as delivered by a [`ChatSource`](crate::source::ChatSource).
//!
//! [`RawMessage`] is read-only input to the pipeline. It mirrors what the
//! remote service reports for one message: identity, timestamp, album
//! membership, text, media, service action, reply header and reactions.
//!
//! # Examples
//!
//! ```
//! use chatarchive::message::{RawMessage, MediaPayload};
//! use chrono::{TimeZone, Utc};
//!
//! let msg = RawMessage::new(7, Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
//!     .with_text("Look at this")
//!     .with_group(900)
//!     .with_media(MediaPayload::photo());
//!
//! assert_eq!(msg.group_id, Some(900));
//! assert!(msg.has_media());
//! ```
//!
//! Records deserialize from JSON, which is how
//! [`JsonDumpSource`](crate::source::JsonDumpSource) loads them:
//!
//! ```
//! use chatarchive::message::{RawMessage, ServiceAction};
//!
//! let json = r#"{"id": 3, "date": "2024-01-15T10:30:00Z",
//!                "action": {"type": "chat_edit_title", "title": "Renamed"}}"#;
//! let msg: RawMessage = serde_json::from_str(json)?;
//! assert_eq!(msg.action, Some(ServiceAction::ChatEditTitle { title: "Renamed".into() }));
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// One message exactly as the remote service reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Message id, monotonically increasing per chat.
    pub id: u64,

    /// When the message was sent (UTC).
    pub date: DateTime<Utc>,

    /// Album identifier shared by all members of one album.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,

    /// Message author, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,

    /// Plain body text as the reader sees it, without markup. Content
    /// filters match against this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// HTML-formatted body, used for rendering. May contain anchors to other
    /// messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Attached media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaPayload>,

    /// Service event marker. Present only on service messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ServiceAction>,

    /// Reply linkage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyHeader>,

    /// Reaction results in the order the service reported them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReactionCount>,
}

impl RawMessage {
    /// Creates a plain message with no body, media or metadata.
    pub fn new(id: u64, date: DateTime<Utc>) -> Self {
        Self {
            id,
            date,
            group_id: None,
            sender: None,
            message: None,
            text: None,
            media: None,
            action: None,
            reply_to: None,
            reactions: Vec::new(),
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Sets a body without markup: the plain text doubles as its HTML.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.message = Some(text.clone());
        self.text = Some(text);
        self
    }

    /// Sets the HTML body only. Call after [`with_text`](Self::with_text)
    /// to give a formatted rendering of the same plain text.
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.text = Some(html.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    #[must_use]
    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: MediaPayload) -> Self {
        self.media = Some(media);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: ServiceAction) -> Self {
        self.action = Some(action);
        self
    }

    #[must_use]
    pub fn with_reply(mut self, reply: ReplyHeader) -> Self {
        self.reply_to = Some(reply);
        self
    }

    #[must_use]
    pub fn with_reaction(mut self, emoticon: impl Into<String>, count: i64) -> Self {
        self.reactions.push(ReactionCount {
            emoticon: Some(emoticon.into()),
            count,
        });
        self
    }

    // =========================================================================
    // Utility methods
    // =========================================================================

    /// Returns the HTML body if it is present and non-empty.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns the visible text if it is present and non-empty.
    ///
    /// Sources that only deliver HTML get it derived from the body: tags
    /// are dropped and the basic entities decoded.
    pub fn plain_text(&self) -> Option<Cow<'_, str>> {
        let text = match self.message.as_deref() {
            Some(plain) => Some(Cow::Borrowed(plain)),
            None => self.text.as_deref().map(strip_markup),
        };
        text.filter(|t| !t.is_empty())
    }

    /// Returns `true` if the message carries a service action.
    pub fn is_service(&self) -> bool {
        self.action.is_some()
    }

    /// Returns `true` if the message carries media.
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

fn strip_markup(html: &str) -> Cow<'_, str> {
    if !html.contains(['<', '&']) {
        return Cow::Borrowed(html);
    }
    let text = TAG
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&");
    Cow::Owned(text)
}

/// Author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Numeric user or channel id.
    pub id: i64,
    /// Display name (first + last name, or channel title).
    pub name: String,
    /// Public username without the leading `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Sender {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            username: None,
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Reply metadata attached to a message.
///
/// In forum chats every message posted inside a topic carries a reply
/// header: `forum_topic` is set and `reply_to_msg_id` points at either the
/// topic root or the message being answered. `reply_to_top_id` is only set
/// when the message answers another message inside the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplyHeader {
    #[serde(default)]
    pub reply_to_msg_id: Option<u64>,
    #[serde(default)]
    pub forum_topic: bool,
    #[serde(default)]
    pub reply_to_top_id: Option<u64>,
}

impl ReplyHeader {
    /// Reply to `target` in a flat chat.
    pub fn to(target: u64) -> Self {
        Self {
            reply_to_msg_id: Some(target),
            forum_topic: false,
            reply_to_top_id: None,
        }
    }

    /// Plain post inside forum topic `topic_id`.
    pub fn in_topic(topic_id: u64) -> Self {
        Self {
            reply_to_msg_id: Some(topic_id),
            forum_topic: true,
            reply_to_top_id: None,
        }
    }

    /// Answer to `target` inside forum topic `topic_id`.
    pub fn in_topic_to(topic_id: u64, target: u64) -> Self {
        Self {
            reply_to_msg_id: Some(target),
            forum_topic: true,
            reply_to_top_id: Some(topic_id),
        }
    }
}

/// One reaction result: an emoticon and how many users chose it.
///
/// Custom-emoji reactions have no emoticon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    #[serde(default)]
    pub emoticon: Option<String>,
    #[serde(default)]
    pub count: i64,
}

// ============================================================================
// Media
// ============================================================================

/// Media attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaPayload {
    /// A compressed photo.
    Photo {
        /// Source-specific handle used to fetch the bytes.
        #[serde(default)]
        location: Option<String>,
    },
    /// Any file sent as a document (video, voice note, audio, GIF, file).
    Document(DocumentMedia),
    /// Media kinds without a downloadable file (web page preview, geo, poll...).
    Other {
        /// Service-side type label.
        label: String,
        #[serde(default)]
        location: Option<String>,
    },
}

impl MediaPayload {
    pub fn photo() -> Self {
        MediaPayload::Photo { location: None }
    }

    /// Returns the source-specific handle for downloading this media.
    pub fn location(&self) -> Option<&str> {
        match self {
            MediaPayload::Photo { location } | MediaPayload::Other { location, .. } => {
                location.as_deref()
            }
            MediaPayload::Document(doc) => doc.location.as_deref(),
        }
    }

    /// Returns the document part, if this is a document.
    pub fn document(&self) -> Option<&DocumentMedia> {
        match self {
            MediaPayload::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Sets the download handle.
    #[must_use]
    pub fn at(mut self, path: impl Into<String>) -> Self {
        let path = Some(path.into());
        match &mut self {
            MediaPayload::Photo { location } | MediaPayload::Other { location, .. } => {
                *location = path;
            }
            MediaPayload::Document(doc) => doc.location = path,
        }
        self
    }
}

/// A file attached as a document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentMedia {
    /// Original file name as uploaded.
    #[serde(default)]
    pub file_name: Option<String>,
    /// MIME type reported by the service.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Special document flavor, if any.
    #[serde(default)]
    pub flavor: Option<DocumentFlavor>,
    #[serde(default)]
    pub location: Option<String>,
}

impl DocumentMedia {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_flavor(mut self, flavor: DocumentFlavor) -> Self {
        self.flavor = Some(flavor);
        self
    }
}

impl From<DocumentMedia> for MediaPayload {
    fn from(doc: DocumentMedia) -> Self {
        MediaPayload::Document(doc)
    }
}

/// Document attributes that make a file a specific media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFlavor {
    Video,
    VideoNote,
    Voice,
    Audio,
    Gif,
}

// ============================================================================
// Service actions
// ============================================================================

/// Service event carried by a message.
///
/// Known kinds are explicit variants; anything else lands in
/// [`Other`](ServiceAction::Other) with the service-side kind name kept for the
/// fallback description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ActionRecord", into = "ActionRecord")]
pub enum ServiceAction {
    ChatAddUser,
    ChatDeleteUser,
    ChatJoinedByLink,
    ChatEditTitle { title: String },
    ChatEditPhoto,
    ChatDeletePhoto,
    ChatCreate,
    ChannelCreate,
    ChatMigrateTo,
    ChannelMigrateFrom,
    PinMessage,
    HistoryClear,
    GameScore,
    PaymentSent,
    PhoneCall,
    ScreenshotTaken,
    CustomAction { message: String },
    BotAllowed,
    SecureValuesSent,
    ContactSignUp,
    GeoProximityReached,
    GroupCall,
    InviteToGroupCall,
    SetMessagesTtl,
    GroupCallScheduled,
    SetChatTheme,
    ChatJoinedByRequest,
    WebViewDataSent,
    GiftPremium,
    TopicCreate,
    TopicEdit,
    /// Unrecognized kind, carrying its service-side name.
    Other(String),
}

/// Wire shape of a service action: a `type` tag plus optional payload strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActionRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<ActionRecord> for ServiceAction {
    fn from(record: ActionRecord) -> Self {
        match record.kind.as_str() {
            "chat_add_user" => ServiceAction::ChatAddUser,
            "chat_delete_user" => ServiceAction::ChatDeleteUser,
            "chat_joined_by_link" => ServiceAction::ChatJoinedByLink,
            "chat_edit_title" => ServiceAction::ChatEditTitle {
                title: record.title.unwrap_or_default(),
            },
            "chat_edit_photo" => ServiceAction::ChatEditPhoto,
            "chat_delete_photo" => ServiceAction::ChatDeletePhoto,
            "chat_create" => ServiceAction::ChatCreate,
            "channel_create" => ServiceAction::ChannelCreate,
            "chat_migrate_to" => ServiceAction::ChatMigrateTo,
            "channel_migrate_from" => ServiceAction::ChannelMigrateFrom,
            "pin_message" => ServiceAction::PinMessage,
            "history_clear" => ServiceAction::HistoryClear,
            "game_score" => ServiceAction::GameScore,
            "payment_sent" => ServiceAction::PaymentSent,
            "phone_call" => ServiceAction::PhoneCall,
            "screenshot_taken" => ServiceAction::ScreenshotTaken,
            "custom_action" => ServiceAction::CustomAction {
                message: record.message.unwrap_or_default(),
            },
            "bot_allowed" => ServiceAction::BotAllowed,
            "secure_values_sent" => ServiceAction::SecureValuesSent,
            "contact_sign_up" => ServiceAction::ContactSignUp,
            "geo_proximity_reached" => ServiceAction::GeoProximityReached,
            "group_call" => ServiceAction::GroupCall,
            "invite_to_group_call" => ServiceAction::InviteToGroupCall,
            "set_messages_ttl" => ServiceAction::SetMessagesTtl,
            "group_call_scheduled" => ServiceAction::GroupCallScheduled,
            "set_chat_theme" => ServiceAction::SetChatTheme,
            "chat_joined_by_request" => ServiceAction::ChatJoinedByRequest,
            "web_view_data_sent" => ServiceAction::WebViewDataSent,
            "gift_premium" => ServiceAction::GiftPremium,
            "topic_create" => ServiceAction::TopicCreate,
            "topic_edit" => ServiceAction::TopicEdit,
            _ => ServiceAction::Other(record.kind),
        }
    }
}

impl From<ServiceAction> for ActionRecord {
    fn from(action: ServiceAction) -> Self {
        let (title, message) = match &action {
            ServiceAction::ChatEditTitle { title } => (Some(title.clone()), None),
            ServiceAction::CustomAction { message } => (None, Some(message.clone())),
            _ => (None, None),
        };
        ActionRecord {
            kind: action.kind().to_string(),
            title,
            message,
        }
    }
}

impl ServiceAction {
    /// Returns the snake_case kind name used on the wire.
    pub fn kind(&self) -> &str {
        match self {
            ServiceAction::ChatAddUser => "chat_add_user",
            ServiceAction::ChatDeleteUser => "chat_delete_user",
            ServiceAction::ChatJoinedByLink => "chat_joined_by_link",
            ServiceAction::ChatEditTitle { .. } => "chat_edit_title",
            ServiceAction::ChatEditPhoto => "chat_edit_photo",
            ServiceAction::ChatDeletePhoto => "chat_delete_photo",
            ServiceAction::ChatCreate => "chat_create",
            ServiceAction::ChannelCreate => "channel_create",
            ServiceAction::ChatMigrateTo => "chat_migrate_to",
            ServiceAction::ChannelMigrateFrom => "channel_migrate_from",
            ServiceAction::PinMessage => "pin_message",
            ServiceAction::HistoryClear => "history_clear",
            ServiceAction::GameScore => "game_score",
            ServiceAction::PaymentSent => "payment_sent",
            ServiceAction::PhoneCall => "phone_call",
            ServiceAction::ScreenshotTaken => "screenshot_taken",
            ServiceAction::CustomAction { .. } => "custom_action",
            ServiceAction::BotAllowed => "bot_allowed",
            ServiceAction::SecureValuesSent => "secure_values_sent",
            ServiceAction::ContactSignUp => "contact_sign_up",
            ServiceAction::GeoProximityReached => "geo_proximity_reached",
            ServiceAction::GroupCall => "group_call",
            ServiceAction::InviteToGroupCall => "invite_to_group_call",
            ServiceAction::SetMessagesTtl => "set_messages_ttl",
            ServiceAction::GroupCallScheduled => "group_call_scheduled",
            ServiceAction::SetChatTheme => "set_chat_theme",
            ServiceAction::ChatJoinedByRequest => "chat_joined_by_request",
            ServiceAction::WebViewDataSent => "web_view_data_sent",
            ServiceAction::GiftPremium => "gift_premium",
            ServiceAction::TopicCreate => "topic_create",
            ServiceAction::TopicEdit => "topic_edit",
            ServiceAction::Other(kind) => kind,
        }
    }
}
