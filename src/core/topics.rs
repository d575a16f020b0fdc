//! Topic resolution: which topics an export covers.
//!
//! Forum chats list their topics up front; the allow/deny lists from the
//! configuration are applied to titles before any message is fetched.
//! Flat chats get one synthetic topic, id 1 "General".

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::ExportConfig;
use crate::core::models::{Topic, TopicMap};
use crate::source::TopicListing;

/// Topic allow/deny lists. Titles match exactly, ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSelection {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TopicSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new()
            .with_include(config.included_topics.iter().cloned())
            .with_exclude(config.excluded_topics.iter().cloned())
    }

    #[must_use]
    pub fn with_include<S: Into<String>>(mut self, titles: impl IntoIterator<Item = S>) -> Self {
        self.include
            .extend(titles.into_iter().map(|t| t.into().to_lowercase()));
        self
    }

    #[must_use]
    pub fn with_exclude<S: Into<String>>(mut self, titles: impl IntoIterator<Item = S>) -> Self {
        self.exclude
            .extend(titles.into_iter().map(|t| t.into().to_lowercase()));
        self
    }

    /// Returns `true` if a topic with this title is exported.
    pub fn admits(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        if !self.include.is_empty() {
            return self.include.contains(&title);
        }
        !self.exclude.contains(&title)
    }
}

/// Topics to export, plus whether the chat is a forum.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTopics {
    pub topics: TopicMap,
    pub is_forum: bool,
}

/// Applies `selection` to a topic listing.
///
/// For flat chats the selection is ignored and the single default topic is
/// returned.
pub fn resolve_topics(listing: TopicListing, selection: &TopicSelection) -> ResolvedTopics {
    match listing {
        TopicListing::NotForum => {
            debug!("chat is not a forum, using the default topic");
            let general = Topic::general();
            ResolvedTopics {
                topics: TopicMap::from([(general.id, general)]),
                is_forum: false,
            }
        }
        TopicListing::Forum(listed) => {
            let total = listed.len();
            let topics: TopicMap = listed
                .into_iter()
                .filter(|(id, title)| {
                    let keep = selection.admits(title);
                    if !keep {
                        debug!(topic_id = id, %title, "topic excluded");
                    }
                    keep
                })
                .map(|(id, title)| (id, Topic::new(id, title)))
                .collect();
            info!("selected {} of {} forum topics", topics.len(), total);
            ResolvedTopics {
                topics,
                is_forum: true,
            }
        }
    }
}
