//! An in-memory [`ChatSource`] for embedding and tests.
//!
//! ```rust
//! use chatarchive::message::RawMessage;
//! use chatarchive::source::{ChatSource, MemorySource};
//! use chrono::Utc;
//!
//! let source = MemorySource::new(42, "Team")
//!     .with_messages([RawMessage::new(1, Utc::now()).with_text("hi")]);
//! let chat = futures::executor::block_on(source.resolve_chat("Team"))?;
//! assert_eq!(chat.id, 42);
//! # Ok::<(), chatarchive::ExportError>(())
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::fs;

use super::{ChatHandle, ChatSource, TopicListing};
use crate::core::references::topic_of;
use crate::error::{ExportError, Result};
use crate::message::RawMessage;

/// One chat held entirely in memory.
///
/// `download` writes the bytes registered for the media location, or an
/// empty file when none were registered.
#[derive(Debug, Default)]
pub struct MemorySource {
    chat: Option<ChatHandle>,
    topics: Option<Vec<(u64, String)>>,
    messages: Vec<RawMessage>,
    files: HashMap<String, Vec<u8>>,
    failing: HashSet<u64>,
    downloads: Mutex<Vec<u64>>,
}

impl MemorySource {
    /// A flat chat with no messages.
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            chat: Some(ChatHandle::new(id, title)),
            ..Self::default()
        }
    }

    /// Turns the chat into a forum with these topics.
    #[must_use]
    pub fn with_topics<S: Into<String>>(mut self, topics: impl IntoIterator<Item = (u64, S)>) -> Self {
        self.topics = Some(topics.into_iter().map(|(id, t)| (id, t.into())).collect());
        self
    }

    #[must_use]
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = RawMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Registers the bytes served for a media location.
    #[must_use]
    pub fn with_file(mut self, location: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(location.into(), bytes.into());
        self
    }

    /// Makes downloads for this message id fail.
    #[must_use]
    pub fn with_failing_download(mut self, message_id: u64) -> Self {
        self.failing.insert(message_id);
        self
    }

    /// Message ids whose media was downloaded, in call order.
    pub fn downloads(&self) -> Vec<u64> {
        self.downloads.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn handle(&self) -> Result<&ChatHandle> {
        self.chat
            .as_ref()
            .ok_or_else(|| ExportError::api("memory source holds no chat"))
    }
}

#[async_trait]
impl ChatSource for MemorySource {
    async fn resolve_chat(&self, identifier: &str) -> Result<ChatHandle> {
        let chat = self.handle()?;
        let matches = identifier == chat.id.to_string()
            || identifier.eq_ignore_ascii_case(&chat.title)
            || chat
                .username
                .as_deref()
                .is_some_and(|u| identifier.trim_start_matches('@') == u);
        if matches {
            Ok(chat.clone())
        } else {
            Err(ExportError::chat_resolution(identifier, "no chat with that name"))
        }
    }

    async fn list_topics(&self, _chat: &ChatHandle) -> Result<TopicListing> {
        Ok(match &self.topics {
            Some(topics) => TopicListing::Forum(topics.clone()),
            None => TopicListing::NotForum,
        })
    }

    fn iter_messages<'a>(
        &'a self,
        _chat: &'a ChatHandle,
        topic_id: Option<u64>,
    ) -> BoxStream<'a, Result<RawMessage>> {
        let is_forum = self.topics.is_some();
        stream::iter(
            self.messages
                .iter()
                .filter(move |m| topic_id.is_none_or(|t| topic_of(m, is_forum) == t))
                .cloned()
                .map(Ok),
        )
        .boxed()
    }

    async fn download(&self, message: &RawMessage, destination: &Path) -> Result<Option<PathBuf>> {
        let Some(media) = &message.media else {
            return Ok(None);
        };
        if self.failing.contains(&message.id) {
            return Err(ExportError::media_download(message.id, "simulated failure"));
        }
        let bytes = media
            .location()
            .and_then(|loc| self.files.get(loc))
            .map(Vec::as_slice)
            .unwrap_or_default();
        fs::write(destination, bytes).await?;
        if let Ok(mut log) = self.downloads.lock() {
            log.push(message.id);
        }
        Ok(Some(destination.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MediaPayload, ReplyHeader};
    use chrono::Utc;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_forum_topic_iteration() {
        let source = MemorySource::new(1, "Forum")
            .with_topics([(1, "General"), (3, "News")])
            .with_messages([
                RawMessage::new(2, Utc::now()),
                RawMessage::new(4, Utc::now()).with_reply(ReplyHeader::in_topic(3)),
            ]);
        let chat = source.resolve_chat("forum").await.unwrap();
        let news: Vec<RawMessage> = source.iter_messages(&chat, Some(3)).try_collect().await.unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].id, 4);
    }

    #[tokio::test]
    async fn test_download_writes_registered_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new(1, "Chat").with_file("a.jpg", b"img".to_vec());
        let msg = RawMessage::new(9, Utc::now()).with_media(MediaPayload::photo().at("a.jpg"));
        let dest = dir.path().join("x.jpg");

        assert!(source.download(&msg, &dest).await.unwrap().is_some());
        assert_eq!(std::fs::read(&dest).unwrap(), b"img");
        assert_eq!(source.downloads(), vec![9]);
    }

    #[tokio::test]
    async fn test_failing_download() {
        let source = MemorySource::new(1, "Chat").with_failing_download(9);
        let msg = RawMessage::new(9, Utc::now()).with_media(MediaPayload::photo());
        let err = source.download(&msg, Path::new("/nonexistent/x")).await.unwrap_err();
        assert!(matches!(err, ExportError::MediaDownload { message_id: 9, .. }));
    }
}
