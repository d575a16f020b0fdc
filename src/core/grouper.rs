//! Partition a flat message stream into albums and singles.
//!
//! Messages sharing a `group_id` form an album. Albums are ordered internally
//! by message id; singles keep their arrival order.
//!
//! # Example
//!
//! ```
//! use chatarchive::core::grouper::group_messages;
//! use chatarchive::message::RawMessage;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let messages = vec![
//!     RawMessage::new(3, now).with_group(77),
//!     RawMessage::new(1, now),
//!     RawMessage::new(2, now).with_group(77),
//! ];
//!
//! let grouped = group_messages(messages);
//! assert_eq!(grouped.albums[&77].iter().map(|m| m.id).collect::<Vec<_>>(), vec![2, 3]);
//! assert_eq!(grouped.singles.len(), 1);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::message::RawMessage;

/// Result of [`group_messages`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouped {
    /// Album id -> members sorted by message id ascending.
    pub albums: BTreeMap<i64, Vec<RawMessage>>,
    /// Ungrouped messages in arrival order.
    pub singles: Vec<RawMessage>,
}

impl Grouped {
    /// Total number of raw messages held.
    pub fn message_count(&self) -> usize {
        self.albums.values().map(Vec::len).sum::<usize>() + self.singles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.message_count() == 0
    }

    /// Flattens albums and singles into one list of work items sorted
    /// chronologically (ties broken by primary id).
    pub fn into_sorted_items(self) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .albums
            .into_values()
            .filter(|members| !members.is_empty())
            .map(Item::Album)
            .chain(self.singles.into_iter().map(Item::Single))
            .collect();
        items.sort_by_key(|item| (item.date(), item.primary_id()));
        items
    }
}

/// One unit of display work: an album or a single message.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Album(Vec<RawMessage>),
    Single(RawMessage),
}

impl Item {
    /// Raw messages in display order.
    pub fn messages(&self) -> &[RawMessage] {
        match self {
            Item::Album(members) => members,
            Item::Single(msg) => std::slice::from_ref(msg),
        }
    }

    /// First message of the item. Albums are never empty.
    pub fn primary(&self) -> &RawMessage {
        &self.messages()[0]
    }

    pub fn primary_id(&self) -> u64 {
        self.primary().id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.primary().date
    }
}

/// Groups messages by their album id.
///
/// Pure function: every input message ends up in exactly one place.
pub fn group_messages(messages: impl IntoIterator<Item = RawMessage>) -> Grouped {
    let mut grouped = Grouped::default();

    for msg in messages {
        match msg.group_id {
            Some(group_id) => grouped.albums.entry(group_id).or_default().push(msg),
            None => grouped.singles.push(msg),
        }
    }

    for members in grouped.albums.values_mut() {
        members.sort_by_key(|m| m.id);
    }

    grouped
}
