//! Data structures produced by the ingestion pipeline.
//!
//! - [`DisplayRecord`] - one renderable album or single message
//! - [`Reaction`] - an emoticon with its count
//! - [`Topic`] - a forum topic (or the synthetic default topic) and its records
//! - [`TopicMap`] - topics keyed by id
//! - [`ExportResult`] - outcome of a whole run

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Id of the synthetic topic that holds every message of a non-forum chat.
pub const DEFAULT_TOPIC_ID: u64 = 1;

/// Title of the synthetic default topic.
pub const DEFAULT_TOPIC_TITLE: &str = "General";

/// Topics keyed by id. Iteration order is ascending id.
pub type TopicMap = BTreeMap<u64, Topic>;

/// The normalized, renderer-ready representation of one album or one single
/// message.
///
/// `id` is the id of the first (primary) raw message. `member_ids` lists every
/// raw message folded into this record, so media downloaded later can be
/// routed back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRecord {
    pub id: u64,
    /// Date in the configured timezone and format.
    pub date: String,
    pub sender: String,
    pub html_content: String,
    pub topic_id: u64,
    pub is_service: bool,
    pub service_description: String,
    pub is_reply: bool,
    pub reply_to_msg_id: Option<u64>,
    /// Empty unless the media was skipped by policy.
    pub skip_reason: String,
    pub reactions: Vec<Reaction>,
    pub member_ids: Vec<u64>,
}

impl DisplayRecord {
    /// Returns `true` if `raw_id` is this record's id or one of its members.
    pub fn represents(&self, raw_id: u64) -> bool {
        self.id == raw_id || self.member_ids.contains(&raw_id)
    }

    /// Appends a media snippet, separated by a line break if the record
    /// already has content.
    pub fn append_media(&mut self, media_html: &str) {
        if !self.html_content.is_empty() {
            self.html_content.push_str("<br>");
        }
        self.html_content.push_str(media_html);
    }
}

/// An emoticon and the number of users who reacted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoticon: String,
    pub count: u64,
}

/// A forum topic, or the single synthetic topic of a flat chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: u64,
    pub title: String,
    /// Records in insertion order (chronological until the render boundary).
    pub messages: Vec<DisplayRecord>,
}

impl Topic {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
        }
    }

    /// The synthetic topic used for non-forum chats.
    pub fn general() -> Self {
        Self::new(DEFAULT_TOPIC_ID, DEFAULT_TOPIC_TITLE)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Counts records across all topics.
pub fn total_records(topics: &TopicMap) -> usize {
    topics.values().map(|t| t.messages.len()).sum()
}

/// Outcome of one export run.
///
/// A run never raises past the orchestration boundary: failures are
/// reported through `success == false` and `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub total_messages: usize,
    pub total_topics: usize,
    pub media_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResult {
    pub fn failure(output_path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: output_path.into(),
            total_messages: 0,
            total_topics: 0,
            media_count: 0,
            error: Some(error.into()),
        }
    }
}
