//! Document rendering.
//!
//! The pipeline hands a [`TopicMap`] to [`prepare_topics`], which fixes the
//! order the document shows, then to a [`Renderer`]:
//! - [`HtmlRenderer`] - single self-contained HTML page with an embedded stylesheet
//!
//! # Example
//!
//! ```rust
//! use chatarchive::core::{Topic, TopicMap};
//! use chatarchive::render::{HtmlRenderer, Renderer, prepare_topics};
//!
//! # fn main() -> chatarchive::Result<()> {
//! let mut topics = TopicMap::new();
//! topics.insert(1, Topic::general());
//!
//! // Empty topics are dropped at the render boundary.
//! let prepared = prepare_topics(topics);
//! assert!(prepared.is_empty());
//!
//! let html = HtmlRenderer::new().render_empty("Team", "Nothing to show")?;
//! assert!(String::from_utf8_lossy(&html).contains("Nothing to show"));
//! # Ok(())
//! # }
//! ```

mod html;

pub use html::HtmlRenderer;

use tracing::debug;

use crate::core::models::{Topic, TopicMap};
use crate::error::Result;

/// Turns prepared topics into document bytes.
pub trait Renderer {
    /// Renders the archive of `chat_name`.
    ///
    /// `topics` is expected to come from [`prepare_topics`]: ascending by id,
    /// none empty, records newest first.
    fn render(&self, chat_name: &str, topics: &[Topic]) -> Result<Vec<u8>>;

    /// Renders a document with no records and an explanatory message.
    fn render_empty(&self, chat_name: &str, message: &str) -> Result<Vec<u8>>;
}

/// Orders topics for display.
///
/// Topics come out ascending by id with empty ones dropped. Records inside
/// each topic are re-sorted newest first (descending id); everything before
/// this point keeps them chronological.
pub fn prepare_topics(topics: TopicMap) -> Vec<Topic> {
    topics
        .into_values()
        .filter_map(|mut topic| {
            if topic.is_empty() {
                debug!(topic_id = topic.id, title = %topic.title, "skipping empty topic");
                return None;
            }
            topic.messages.sort_by(|a, b| b.id.cmp(&a.id));
            Some(topic)
        })
        .collect()
}

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
