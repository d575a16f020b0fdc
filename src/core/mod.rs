//! Core ingestion pipeline.
//!
//! This module contains:
//! - [`grouper`] - Albums vs. single messages
//! - [`filter`] - Substring filter with album propagation
//! - [`topics`] - Forum topic selection
//! - [`references`] - Service descriptions, replies, reactions, labels
//! - [`links`] - Same-chat permalink rewriting
//! - [`media`] - Media naming, skip policy and batched downloads
//! - [`retry`] - Exponential-backoff retry
//! - [`pipeline`] - The two-phase coordinator
//! - [`models`] - Display records, topics and run results
//!
//! # Quick Start
//!
//! ```rust
//! use chatarchive::core::{ContentFilter, apply_filter, group_messages};
//! use chatarchive::message::RawMessage;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let grouped = group_messages(vec![
//!     RawMessage::new(1, now).with_text("bug found").with_group(5),
//!     RawMessage::new(2, now).with_group(5),
//!     RawMessage::new(3, now).with_text("lunch?"),
//! ]);
//!
//! let filtered = apply_filter(grouped, &ContentFilter::new().with_include(["bug"]));
//! assert_eq!(filtered.kept.message_count(), 2);
//! assert_eq!(filtered.excluded, 1);
//! ```

pub mod filter;
pub mod grouper;
pub mod links;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod references;
pub mod retry;
pub mod topics;

pub use filter::{ContentFilter, Filtered, apply_filter};
pub use grouper::{Grouped, Item, group_messages};
pub use links::LinkRewriter;
pub use media::{MediaJob, MediaOutcome, MediaPipeline, MediaStats, MediaType};
pub use models::{
    DEFAULT_TOPIC_ID, DEFAULT_TOPIC_TITLE, DisplayRecord, ExportResult, Reaction, Topic, TopicMap,
    total_records,
};
pub use pipeline::{MessagePipeline, Stage, TopicReport};
pub use retry::RetryPolicy;
pub use topics::{ResolvedTopics, TopicSelection, resolve_topics};
