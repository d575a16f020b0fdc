//! # Chatarchive
//!
//! A Rust library for exporting a chat's message history, optionally split
//! into forum topics, into a single self-contained HTML archive.
//!
//! ## Overview
//!
//! An export run pulls raw messages from a [`ChatSource`](source::ChatSource),
//! and for every exported topic:
//! - groups album members into one record
//! - applies the substring content filter (albums are kept or dropped whole)
//! - builds display records: sender, date, service descriptions, replies,
//!   reactions, and permalinks to the same chat rewritten into in-document anchors
//! - downloads media in bounded batches and attaches it to its record
//!
//! The topics are then ordered for display and rendered to HTML.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatarchive::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let source = JsonDumpSource::open("dump.json").await?;
//! let config = ExportConfig::new("@rustlang", "archive.html")
//!     .with_skip_media_types([MediaType::Video])
//!     .with_include_substrings(["release"]);
//!
//! let result = Exporter::new(source).export(&config).await;
//! if result.success {
//!     println!("{} messages in {} topics", result.total_messages, result.total_topics);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`export`] — [`Exporter`](export::Exporter), the top-level run
//! - [`core`] — the ingestion pipeline
//!   - [`core::grouper`], [`core::filter`], [`core::topics`], [`core::references`]
//!   - [`core::links`], [`core::media`], [`core::retry`], [`core::pipeline`]
//!   - [`core::models`] — [`DisplayRecord`](core::DisplayRecord), [`Topic`](core::Topic), [`ExportResult`]
//! - [`source`] — [`ChatSource`](source::ChatSource) and its implementations
//! - [`render`] — [`Renderer`](render::Renderer), [`HtmlRenderer`](render::HtmlRenderer)
//! - [`message`] — [`RawMessage`](message::RawMessage) as delivered by a source
//! - [`config`] — [`ExportConfig`](config::ExportConfig)
//! - [`progress`] — progress callbacks
//! - [`cli`] — CLI arguments (`cli` feature)
//! - [`error`] — Unified error types ([`ExportError`], [`Result`])
//! - [`prelude`] — Convenient re-exports

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod message;
pub mod progress;
pub mod render;
pub mod source;

// Re-export the main types at the crate root for convenience
pub use crate::core::models::ExportResult;
pub use error::{ExportError, Result};

/// Convenient re-exports for common usage.
///
/// ```rust
/// use chatarchive::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ExportError, Result};

    pub use crate::config::ExportConfig;
    pub use crate::export::Exporter;

    pub use crate::message::{MediaPayload, RawMessage, ReplyHeader, Sender, ServiceAction};

    pub use crate::core::{
        ContentFilter, DisplayRecord, ExportResult, LinkRewriter, MediaType, Topic, TopicMap,
        apply_filter, group_messages,
    };

    pub use crate::source::{ChatHandle, ChatSource, JsonDumpSource, MemorySource, TopicListing};

    pub use crate::render::{HtmlRenderer, Renderer, prepare_topics};

    pub use crate::progress::{Progress, ProgressCallback};
}
