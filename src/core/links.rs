//! Rewrites permalinks into the exported chat as in-document anchors.
//!
//! Three link shapes are recognized:
//!
//! | Chat kind | Link | Rewritten to |
//! |-----------|------|--------------|
//! | forum | `https://t.me/c/{chat}/{topic}/{message}` | `#msg-{message}` |
//! | forum | `https://t.me/c/{chat}/{topic}` | `#topic-{topic}` |
//! | flat | `https://t.me/c/{chat}/{message}` | `#msg-{message}` |
//!
//! Links into other chats are left byte-identical. Rewritten anchors no
//! longer point at `t.me`, so running the rewriter twice is a no-op.
//!
//! # Example
//!
//! ```rust
//! use chatarchive::core::links::LinkRewriter;
//!
//! let rewriter = LinkRewriter::new(1234, false);
//! let html = r#"see <a href="https://t.me/c/1234/56">this</a>"#;
//! assert_eq!(
//!     rewriter.rewrite(html),
//!     r##"see <a href="#msg-56" class="internal-link" data-msg-id="56">this</a>"##
//! );
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `/c/{chat}/{topic}/{message}`.
static FORUM_MESSAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s+href="https://t\.me/c/(\d+)/(\d+)/(\d+)(?:\?[^"]*)?"([^>]*)>(.*?)</a>"#)
        .expect("forum message link pattern is valid")
});

/// `/c/{chat}/{id}` with nothing but an optional query after the id.
/// Serves forum topic links and flat-chat message links.
static TWO_SEGMENT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s+href="https://t\.me/c/(\d+)/(\d+)(?:\?[^"]*)?"([^>]*)>(.*?)</a>"#)
        .expect("two-segment link pattern is valid")
});

static CLASS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="([^"]*)""#).expect("class attribute pattern is valid"));

/// Rewrites same-chat permalinks in message HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRewriter {
    chat_id: i64,
    is_forum: bool,
}

impl LinkRewriter {
    pub fn new(chat_id: i64, is_forum: bool) -> Self {
        Self { chat_id, is_forum }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn is_forum(&self) -> bool {
        self.is_forum
    }

    /// Rewrites every recognized same-chat link in `html`.
    pub fn rewrite(&self, html: &str) -> String {
        if self.is_forum {
            // Message links first so they are never read as topic links.
            let pass = FORUM_MESSAGE_LINK.replace_all(html, |caps: &Captures<'_>| {
                self.rewrite_anchor(caps, |caps| {
                    let topic = &caps[2];
                    let message = &caps[3];
                    let attrs = &caps[4];
                    let body = &caps[5];
                    (
                        format!("#msg-{message}"),
                        attrs.to_string(),
                        format!(r#" data-msg-id="{message}" data-topic-id="{topic}""#),
                        body.to_string(),
                    )
                })
            });
            TWO_SEGMENT_LINK
                .replace_all(&pass, |caps: &Captures<'_>| {
                    self.rewrite_anchor(caps, |caps| {
                        let topic = &caps[2];
                        (
                            format!("#topic-{topic}"),
                            caps[3].to_string(),
                            format!(r#" data-topic-id="{topic}""#),
                            caps[4].to_string(),
                        )
                    })
                })
                .into_owned()
        } else {
            TWO_SEGMENT_LINK
                .replace_all(html, |caps: &Captures<'_>| {
                    self.rewrite_anchor(caps, |caps| {
                        let message = &caps[2];
                        (
                            format!("#msg-{message}"),
                            caps[3].to_string(),
                            format!(r#" data-msg-id="{message}""#),
                            caps[4].to_string(),
                        )
                    })
                })
                .into_owned()
        }
    }

    /// Builds the replacement for one matched anchor, or returns the match
    /// unchanged when it points at another chat.
    fn rewrite_anchor<F>(&self, caps: &Captures<'_>, parts: F) -> String
    where
        F: FnOnce(&Captures<'_>) -> (String, String, String, String),
    {
        let same_chat = caps[1].parse::<i64>().is_ok_and(|id| id == self.chat_id);
        if !same_chat {
            return caps[0].to_string();
        }

        let (href, attrs, data, body) = parts(caps);
        format!(r#"<a href="{href}"{}{data}>{body}</a>"#, mark_internal(&attrs))
    }
}

/// Adds the `internal-link` class, merging into an existing class attribute.
fn mark_internal(attrs: &str) -> Cow<'_, str> {
    if CLASS_ATTR.is_match(attrs) {
        CLASS_ATTR.replace(attrs, r#"class="$1 internal-link""#)
    } else {
        Cow::Owned(format!(r#" class="internal-link"{attrs}"#))
    }
}
