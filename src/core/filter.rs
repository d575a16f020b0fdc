//! Filter messages by substrings of their visible text, with album
//! propagation.
//!
//! This module provides [`ContentFilter`] for deciding whether a raw message
//! is exported, and [`apply_filter`] for filtering grouped messages.
//!
//! # Rules
//!
//! | Step | Condition | Result |
//! |------|-----------|--------|
//! | 1 | message carries a service action | admit |
//! | 2 | include and exclude sets both empty | admit |
//! | 3 | message has no visible text | admit iff include set is empty |
//! | 4 | include set non-empty and nothing in it matches | reject |
//! | 5 | exclude set non-empty and anything in it matches | reject |
//! | 6 | otherwise | admit |
//!
//! Substrings match the plain text ([`RawMessage::plain_text`]), never the
//! HTML markup around it.
//!
//! An album is admitted as a whole if **any** member is admitted.
//!
//! # Examples
//!
//! ```
//! use chatarchive::core::filter::ContentFilter;
//! use chatarchive::message::RawMessage;
//! use chrono::Utc;
//!
//! let filter = ContentFilter::new()
//!     .with_include(["bug"])
//!     .with_exclude(["wontfix"]);
//!
//! let now = Utc::now();
//! assert!(filter.admits(&RawMessage::new(1, now).with_text("found a bug")));
//! assert!(!filter.admits(&RawMessage::new(2, now).with_text("bug, wontfix")));
//! assert!(!filter.admits(&RawMessage::new(3, now).with_text("hello")));
//! ```

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::ExportConfig;
use crate::core::grouper::Grouped;
use crate::message::RawMessage;

/// Include/exclude substring filter over visible message text.
///
/// Pure predicate: no state changes after construction.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
    case_sensitive: bool,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            include: BTreeSet::new(),
            exclude: BTreeSet::new(),
            case_sensitive: true,
        }
    }
}

impl ContentFilter {
    /// Creates a filter that admits everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the filter from an export configuration.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new()
            .with_include(config.include_substrings.iter().cloned())
            .with_exclude(config.exclude_substrings.iter().cloned())
            .with_case_sensitive(config.case_sensitive)
    }

    /// Adds include substrings. Empty strings are ignored.
    #[must_use]
    pub fn with_include<S: Into<String>>(mut self, subs: impl IntoIterator<Item = S>) -> Self {
        self.include
            .extend(subs.into_iter().map(Into::into).filter(|s| !s.is_empty()));
        self
    }

    /// Adds exclude substrings. Empty strings are ignored.
    #[must_use]
    pub fn with_exclude<S: Into<String>>(mut self, subs: impl IntoIterator<Item = S>) -> Self {
        self.exclude
            .extend(subs.into_iter().map(Into::into).filter(|s| !s.is_empty()));
        self
    }

    #[must_use]
    pub fn with_case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = sensitive;
        self
    }

    /// Returns `true` if any substring set is non-empty.
    pub fn is_active(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    /// Decides whether a single raw message is exported.
    pub fn admits(&self, msg: &RawMessage) -> bool {
        // Service events are structural and never hidden.
        if msg.is_service() {
            return true;
        }

        if !self.is_active() {
            return true;
        }

        let Some(text) = msg.plain_text() else {
            return self.include.is_empty();
        };

        if !self.include.is_empty() && !self.contains_any(&text, &self.include) {
            return false;
        }

        if !self.exclude.is_empty() && self.contains_any(&text, &self.exclude) {
            return false;
        }

        true
    }

    /// Decides whether an album is exported: true iff any member is admitted.
    pub fn admits_group(&self, members: &[RawMessage]) -> bool {
        members.iter().any(|msg| self.admits(msg))
    }

    /// Human-readable description of the active filters.
    pub fn summary(&self) -> String {
        if !self.is_active() {
            return "filtering disabled".to_string();
        }

        let mut parts = Vec::new();
        if !self.include.is_empty() {
            parts.push(format!("include: {}", join(&self.include)));
        }
        if !self.exclude.is_empty() {
            parts.push(format!("exclude: {}", join(&self.exclude)));
        }
        let case = if self.case_sensitive {
            "case-sensitive"
        } else {
            "case-insensitive"
        };

        format!(
            "{} ({}) - service messages are always included",
            parts.join(" | "),
            case
        )
    }

    fn contains_any(&self, text: &str, needles: &BTreeSet<String>) -> bool {
        if self.case_sensitive {
            needles.iter().any(|needle| text.contains(needle.as_str()))
        } else {
            let haystack = text.to_lowercase();
            needles
                .iter()
                .any(|needle| haystack.contains(&needle.to_lowercase()))
        }
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Outcome of [`apply_filter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filtered {
    pub kept: Grouped,
    /// Raw messages dropped, counting every member of a dropped album.
    pub excluded: usize,
}

/// Filters grouped messages. Albums pass or fail as a whole.
pub fn apply_filter(grouped: Grouped, filter: &ContentFilter) -> Filtered {
    if !filter.is_active() {
        return Filtered {
            kept: grouped,
            excluded: 0,
        };
    }

    let mut out = Filtered::default();

    for (group_id, members) in grouped.albums {
        if filter.admits_group(&members) {
            debug!(group_id, members = members.len(), "album included");
            out.kept.albums.insert(group_id, members);
        } else {
            debug!(group_id, members = members.len(), "album excluded");
            out.excluded += members.len();
        }
    }

    for msg in grouped.singles {
        if filter.admits(&msg) {
            out.kept.singles.push(msg);
        } else {
            out.excluded += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grouper::group_messages;
    use crate::message::ServiceAction;
    use chrono::{TimeZone, Utc};

    fn msg(id: u64, text: Option<&str>) -> RawMessage {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let m = RawMessage::new(id, ts);
        match text {
            Some(t) => m.with_text(t),
            None => m,
        }
    }

    #[test]
    fn test_no_filters_admit_everything() {
        let filter = ContentFilter::new();
        assert!(!filter.is_active());
        assert!(filter.admits(&msg(1, Some("anything"))));
        assert!(filter.admits(&msg(2, None)));
    }

    #[test]
    fn test_service_messages_always_admitted() {
        let filter = ContentFilter::new().with_include(["needle"]);
        let service = msg(1, None).with_action(ServiceAction::PinMessage);
        assert!(filter.admits(&service));

        let filter = ContentFilter::new().with_exclude(["pinned"]);
        let service = msg(2, Some("pinned")).with_action(ServiceAction::PinMessage);
        assert!(filter.admits(&service));
    }

    #[test]
    fn test_textless_messages() {
        let include = ContentFilter::new().with_include(["x"]);
        assert!(!include.admits(&msg(1, None)));

        let exclude = ContentFilter::new().with_exclude(["x"]);
        assert!(exclude.admits(&msg(1, None)));

        let both = ContentFilter::new().with_include(["x"]).with_exclude(["y"]);
        assert!(!both.admits(&msg(1, Some(""))));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = ContentFilter::new()
            .with_include(["rust"])
            .with_exclude(["spam"]);
        assert!(filter.admits(&msg(1, Some("rust release"))));
        assert!(!filter.admits(&msg(2, Some("rust spam"))));
        assert!(!filter.admits(&msg(3, Some("go release"))));
    }

    #[test]
    fn test_case_sensitivity() {
        let sensitive = ContentFilter::new().with_include(["Bug"]);
        assert!(!sensitive.admits(&msg(1, Some("a bug here"))));

        let insensitive = ContentFilter::new()
            .with_include(["Bug"])
            .with_case_sensitive(false);
        assert!(insensitive.admits(&msg(1, Some("a BUG here"))));
        assert!(insensitive.admits(&msg(2, Some("ошибка BUG"))));
    }

    #[test]
    fn test_case_insensitive_unicode() {
        let filter = ContentFilter::new()
            .with_exclude(["СПАМ"])
            .with_case_sensitive(false);
        assert!(!filter.admits(&msg(1, Some("это спам"))));
    }

    #[test]
    fn test_markup_is_not_matched() {
        let linked = msg(1, Some("see this")).with_html(r#"see <a href="https://t.me/c/1/2">this</a>"#);
        assert!(ContentFilter::new().with_exclude(["t.me"]).admits(&linked));
        assert!(!ContentFilter::new().with_include(["href"]).admits(&linked));

        let bold = msg(2, Some("hello")).with_html("<strong>hello</strong>");
        assert!(!ContentFilter::new().with_include(["strong"]).admits(&bold));
        assert!(ContentFilter::new().with_include(["hello"]).admits(&bold));
    }

    #[test]
    fn test_html_only_body_matches_visible_text() {
        let html_only = RawMessage::new(3, Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
            .with_html(r#"<a href="https://t.me/c/1/2" class="bug">release notes</a>"#);
        assert!(!ContentFilter::new().with_include(["bug"]).admits(&html_only));
        assert!(ContentFilter::new().with_include(["release"]).admits(&html_only));
    }

    #[test]
    fn test_admits_group_any_member() {
        let filter = ContentFilter::new().with_include(["bug"]);
        let members = vec![msg(1, None), msg(2, Some("found a bug")), msg(3, Some("other"))];
        assert!(filter.admits_group(&members));
        assert!(!filter.admits_group(&[msg(4, Some("nothing")), msg(5, None)]));
        assert!(!filter.admits_group(&[]));
    }

    #[test]
    fn test_apply_filter_propagates_to_album() {
        let grouped = group_messages(vec![
            msg(1, None).with_group(7),
            msg(2, Some("bug report")).with_group(7),
            msg(3, Some("caption")).with_group(7),
            msg(4, Some("unrelated")),
            msg(5, Some("another bug")),
        ]);
        let filter = ContentFilter::new().with_include(["bug"]);
        let out = apply_filter(grouped, &filter);

        assert_eq!(out.kept.albums[&7].len(), 3);
        assert_eq!(out.kept.singles.len(), 1);
        assert_eq!(out.kept.singles[0].id, 5);
        assert_eq!(out.excluded, 1);
    }

    #[test]
    fn test_empty_substrings_ignored() {
        let filter = ContentFilter::new().with_include([""]);
        assert!(!filter.is_active());
    }

    #[test]
    fn test_summary() {
        assert_eq!(ContentFilter::new().summary(), "filtering disabled");
        let summary = ContentFilter::new()
            .with_include(["b", "a"])
            .with_exclude(["z"])
            .with_case_sensitive(false)
            .summary();
        assert!(summary.contains("include: a, b"));
        assert!(summary.contains("exclude: z"));
        assert!(summary.contains("case-insensitive"));
    }
}
