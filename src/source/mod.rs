//! Message sources: where raw messages and media bytes come from.
//!
//! The export pipeline talks to the remote service only through the
//! [`ChatSource`] trait. [`JsonDumpSource`] implements it over a JSON dump on
//! disk; [`MemorySource`] holds one chat in memory.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatarchive::source::{ChatSource, JsonDumpSource};
//! use futures::TryStreamExt;
//!
//! # async fn example() -> chatarchive::Result<()> {
//! let source = JsonDumpSource::open("dump.json").await?;
//! let chat = source.resolve_chat("@rustlang").await?;
//! let messages: Vec<_> = source.iter_messages(&chat, None).try_collect().await?;
//! println!("{}: {} messages", chat.title, messages.len());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::RawMessage;

mod json_dump;
mod memory;

pub use json_dump::{ChatDump, DumpFile, JsonDumpSource, TopicDump};
pub use memory::MemorySource;

/// A resolved chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHandle {
    /// Numeric chat id as it appears in permalinks (without the `-100`
    /// channel prefix).
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ChatHandle {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            username: None,
        }
    }

    /// Name shown in the rendered document.
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            self.username.as_deref().unwrap_or("chat")
        } else {
            &self.title
        }
    }
}

/// Answer of [`ChatSource::list_topics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicListing {
    /// Forum topics as `(id, title)` in service order.
    Forum(Vec<(u64, String)>),
    /// The chat has no topics.
    NotForum,
}

/// The remote service, as seen by the export pipeline.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Resolves an id, `@username` or title to exactly one chat.
    ///
    /// Fails with [`ExportError::ChatResolution`](crate::ExportError::ChatResolution)
    /// if the identifier is unknown or ambiguous.
    async fn resolve_chat(&self, identifier: &str) -> Result<ChatHandle>;

    async fn list_topics(&self, chat: &ChatHandle) -> Result<TopicListing>;

    /// Streams the full history of a chat, or of one forum topic when
    /// `topic_id` is given. Order is unspecified.
    fn iter_messages<'a>(
        &'a self,
        chat: &'a ChatHandle,
        topic_id: Option<u64>,
    ) -> BoxStream<'a, Result<RawMessage>>;

    /// Stores the media of `message` at `destination`.
    ///
    /// Returns the final path, or `None` if the message had nothing to
    /// download.
    async fn download(&self, message: &RawMessage, destination: &Path) -> Result<Option<PathBuf>>;
}
