//! The ingestion pipeline for one topic (or one flat chat).
//!
//! ```text
//! Collecting -> Grouping -> Filtering -> TextPass -> MediaPass -> Merged
//!                               |
//!                               +-> Empty (nothing admitted)
//! ```
//!
//! The text pass builds one [`DisplayRecord`] per album or single, in
//! chronological order, and indexes every member id. The media pass runs
//! afterwards and routes each finished snippet back through that index.
//! Records stay chronological here; the newest-first order is applied at the
//! render boundary ([`prepare_topics`](crate::render::prepare_topics)).

use std::collections::HashMap;
use std::fmt;

use chrono_tz::Tz;
use futures::TryStreamExt;
use tracing::{debug, info, warn};

use crate::config::{ExportConfig, MediaConfig};
use crate::core::filter::{ContentFilter, apply_filter};
use crate::core::grouper::{Item, group_messages};
use crate::core::links::LinkRewriter;
use crate::core::media::{MediaOutcome, MediaPipeline, MediaStats};
use crate::core::models::{DEFAULT_TOPIC_ID, DisplayRecord, Topic, TopicMap};
use crate::core::references::{
    classify_service, extract_reactions, format_date, reply_target, sender_label, skip_reason,
    topic_of,
};
use crate::error::Result;
use crate::message::RawMessage;
use crate::progress::{Phase, ProgressCallback, ProgressReporter, log_progress};
use crate::source::{ChatHandle, ChatSource};

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collecting,
    Grouping,
    Filtering,
    TextPass,
    MediaPass,
    Merged,
    /// Every message was filtered out; text and media passes were skipped.
    Empty,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Collecting => "collecting",
            Stage::Grouping => "grouping",
            Stage::Filtering => "filtering",
            Stage::TextPass => "text pass",
            Stage::MediaPass => "media pass",
            Stage::Merged => "merged",
            Stage::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// What one pipeline run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicReport {
    pub topic_id: u64,
    pub collected: usize,
    pub excluded: usize,
    pub records: usize,
    pub media: MediaStats,
    /// Terminal stage: [`Stage::Merged`] or [`Stage::Empty`].
    pub stage: Stage,
}

/// Member id -> (topic id, position in that topic's records).
pub type RecordIndex = HashMap<u64, (u64, usize)>;

/// Turns raw messages into display records for one chat.
pub struct MessagePipeline {
    filter: ContentFilter,
    rewriter: LinkRewriter,
    media_config: MediaConfig,
    timezone: Tz,
    date_format: String,
    progress_interval: usize,
    progress: ProgressCallback,
}

impl fmt::Debug for MessagePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePipeline")
            .field("filter", &self.filter)
            .field("rewriter", &self.rewriter)
            .field("timezone", &self.timezone)
            .field("date_format", &self.date_format)
            .finish_non_exhaustive()
    }
}

impl MessagePipeline {
    pub fn new(config: &ExportConfig, rewriter: LinkRewriter) -> Self {
        let filter = ContentFilter::from_config(config);
        info!("content filter: {}", filter.summary());
        Self {
            filter,
            rewriter,
            media_config: config.media(),
            timezone: config.timezone,
            date_format: config.date_format.clone(),
            progress_interval: config.progress_log_interval,
            progress: log_progress(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Runs every stage for `topic_id` (or the whole chat when `None`),
    /// adding records to `topics`.
    ///
    /// The topic is registered in `topics` even when nothing is admitted.
    ///
    /// # Errors
    ///
    /// Fails if the message stream fails. Media failures are logged and
    /// never returned.
    pub async fn run<S>(
        &self,
        source: &S,
        chat: &ChatHandle,
        topic_id: Option<u64>,
        topics: &mut TopicMap,
        media: &mut MediaPipeline,
    ) -> Result<TopicReport>
    where
        S: ChatSource + ?Sized,
    {
        let context_topic = topic_id.unwrap_or(DEFAULT_TOPIC_ID);
        topics
            .entry(context_topic)
            .or_insert_with(|| Topic::new(context_topic, format!("Topic {context_topic}")));

        let mut report = TopicReport {
            topic_id: context_topic,
            collected: 0,
            excluded: 0,
            records: 0,
            media: MediaStats::default(),
            stage: Stage::Collecting,
        };

        info!(topic_id = context_topic, stage = %Stage::Collecting, "collecting messages");
        let messages = self.collect(source, chat, topic_id).await?;
        report.collected = messages.len();
        info!(topic_id = context_topic, "collected {} messages", messages.len());

        report.stage = Stage::Grouping;
        let grouped = group_messages(messages);

        report.stage = Stage::Filtering;
        let filtered = apply_filter(grouped, &self.filter);
        report.excluded = filtered.excluded;
        let admitted = filtered.kept.message_count();
        info!(
            topic_id = context_topic,
            albums = filtered.kept.albums.len(),
            "after filtering: {admitted} messages, {} excluded",
            filtered.excluded
        );

        if admitted == 0 {
            info!(topic_id = context_topic, "all messages filtered out");
            report.stage = Stage::Empty;
            return Ok(report);
        }

        report.stage = Stage::TextPass;
        let items = filtered.kept.into_sorted_items();
        let is_forum = self.rewriter.is_forum();
        let index = self.text_pass(&items, topics, context_topic, is_forum);
        report.records = items.len();
        info!(topic_id = context_topic, stage = %Stage::TextPass, "built {} records", items.len());

        report.stage = Stage::MediaPass;
        let (outcomes, stats) = media
            .process(source, items.iter().flat_map(Item::messages))
            .await;
        report.media = stats;
        let routed = merge_media(topics, &index, outcomes);
        info!(
            topic_id = context_topic,
            stage = %Stage::MediaPass,
            downloaded = stats.downloaded,
            failed = stats.failed,
            "attached {routed} media files"
        );

        report.stage = Stage::Merged;
        Ok(report)
    }

    /// Drains the source into memory.
    async fn collect<S>(&self, source: &S, chat: &ChatHandle, topic_id: Option<u64>) -> Result<Vec<RawMessage>>
    where
        S: ChatSource + ?Sized,
    {
        let reporter = ProgressReporter::new(Phase::Collecting, self.progress_interval, self.progress.clone());
        let mut stream = source.iter_messages(chat, topic_id);
        let mut messages = Vec::new();
        while let Some(msg) = stream.try_next().await? {
            messages.push(msg);
            reporter.tick(messages.len(), None);
        }
        Ok(messages)
    }

    /// Builds one record per item, in order, and returns the member index.
    ///
    /// A record goes to the topic its first message belongs to, or to
    /// `context_topic` if that topic is not part of the export.
    pub fn text_pass(&self, items: &[Item], topics: &mut TopicMap, context_topic: u64, is_forum: bool) -> RecordIndex {
        let mut index = RecordIndex::new();

        for item in items {
            let resolved = topic_of(item.primary(), is_forum);
            let topic_id = if topics.contains_key(&resolved) {
                resolved
            } else {
                context_topic
            };
            let record = self.build_record(item, topic_id);
            let Some(topic) = topics.get_mut(&topic_id) else {
                warn!(topic_id, "no topic registered, dropping record {}", record.id);
                continue;
            };
            let position = topic.messages.len();
            for &member in &record.member_ids {
                index.insert(member, (topic_id, position));
            }
            debug!(record_id = record.id, topic_id, members = record.member_ids.len(), "record built");
            topic.messages.push(record);
        }

        index
    }

    /// Builds the record for one album or single. Metadata comes from the
    /// first message; album bodies are joined with line breaks.
    pub fn build_record(&self, item: &Item, topic_id: u64) -> DisplayRecord {
        let members = item.messages();
        let primary = item.primary();

        let html_content = members
            .iter()
            .filter_map(RawMessage::body)
            .map(|body| self.rewriter.rewrite(body))
            .collect::<Vec<_>>()
            .join("<br>");

        let (is_service, service_description) = classify_service(primary);
        let reply_to_msg_id = reply_target(primary);

        DisplayRecord {
            id: primary.id,
            date: format_date(primary.date, self.timezone, &self.date_format),
            sender: sender_label(primary.sender.as_ref()),
            html_content,
            topic_id,
            is_service,
            service_description,
            is_reply: reply_to_msg_id.is_some(),
            reply_to_msg_id,
            skip_reason: skip_reason(primary, &self.media_config).unwrap_or_default(),
            reactions: extract_reactions(primary),
            member_ids: members.iter().map(|m| m.id).collect(),
        }
    }
}

/// Appends each media snippet to the record that represents its message.
/// Returns how many snippets were attached.
pub fn merge_media(topics: &mut TopicMap, index: &RecordIndex, outcomes: Vec<MediaOutcome>) -> usize {
    let mut attached = 0;
    for outcome in outcomes {
        let record = match index.get(&outcome.message_id) {
            Some(&(topic_id, position)) => topics
                .get_mut(&topic_id)
                .and_then(|t| t.messages.get_mut(position)),
            None => topics
                .values_mut()
                .flat_map(|t| t.messages.iter_mut())
                .find(|r| r.represents(outcome.message_id)),
        };
        match record {
            Some(record) => {
                record.append_media(&outcome.html);
                attached += 1;
            }
            None => warn!(message_id = outcome.message_id, "no record for downloaded media"),
        }
    }
    attached
}
