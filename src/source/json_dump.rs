//! A [`ChatSource`] backed by a JSON dump on disk.
//!
//! # Format
//!
//! ```json
//! {
//!   "media_root": "media",
//!   "chats": [
//!     {
//!       "id": 1234567,
//!       "title": "Rust Forum",
//!       "username": "rustforum",
//!       "is_forum": true,
//!       "topics": [{ "id": 5, "title": "Releases" }],
//!       "messages": [{ "id": 6, "date": "2024-01-15T10:30:00Z", "message": "1.75 is out",
//!                      "text": "<b>1.75</b> is out",
//!                      "reply_to": { "reply_to_msg_id": 5, "forum_topic": true } }]
//!     }
//!   ]
//! }
//! ```
//!
//! Media `location`s are paths relative to `media_root`, which itself is
//! relative to the dump file unless absolute. A location may not leave the
//! media root: absolute paths and `..` components are rejected.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use super::{ChatHandle, ChatSource, TopicListing};
use crate::core::references::topic_of;
use crate::error::{ExportError, Result};
use crate::message::RawMessage;

/// Top-level dump document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DumpFile {
    #[serde(default)]
    pub media_root: Option<PathBuf>,
    #[serde(default)]
    pub chats: Vec<ChatDump>,
}

/// One chat in a dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDump {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub is_forum: bool,
    #[serde(default)]
    pub topics: Vec<TopicDump>,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

impl ChatDump {
    fn handle(&self) -> ChatHandle {
        ChatHandle {
            id: self.id,
            title: self.title.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDump {
    pub id: u64,
    pub title: String,
}

/// Reads chats, topics, messages and media from a dump.
#[derive(Debug, Clone)]
pub struct JsonDumpSource {
    dump: DumpFile,
    media_root: PathBuf,
}

impl JsonDumpSource {
    /// Loads a dump file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid dump.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let dump: DumpFile = serde_json::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        info!(
            path = %path.display(),
            chats = dump.chats.len(),
            "loaded message dump"
        );
        Ok(Self::from_dump(dump, base))
    }

    /// Wraps an in-memory dump. Relative media roots resolve against `base`.
    pub fn from_dump(dump: DumpFile, base: impl AsRef<Path>) -> Self {
        let media_root = match &dump.media_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => base.as_ref().join(root),
            None => base.as_ref().to_path_buf(),
        };
        Self { dump, media_root }
    }

    pub fn chats(&self) -> &[ChatDump] {
        &self.dump.chats
    }

    fn chat(&self, handle: &ChatHandle) -> Result<&ChatDump> {
        self.dump
            .chats
            .iter()
            .find(|c| c.id == handle.id)
            .ok_or_else(|| ExportError::api(format!("chat {} is not in the dump", handle.id)))
    }

    fn by_name(&self, identifier: &str) -> Result<&ChatDump> {
        let username = identifier.trim_start_matches('@');
        if let Some(chat) = self.dump.chats.iter().find(|c| {
            c.username
                .as_deref()
                .is_some_and(|u| u.eq_ignore_ascii_case(username))
        }) {
            debug!(username, "chat found by username");
            return Ok(chat);
        }

        let needle = identifier.to_lowercase();
        let exact: Vec<&ChatDump> = self
            .dump
            .chats
            .iter()
            .filter(|c| c.title.to_lowercase() == needle)
            .collect();
        let partial: Vec<&ChatDump> = self
            .dump
            .chats
            .iter()
            .filter(|c| {
                let title = c.title.to_lowercase();
                title != needle && title.contains(&needle)
            })
            .collect();

        match (exact.as_slice(), partial.as_slice()) {
            ([], []) => Err(ExportError::chat_resolution(identifier, "no chat with that name")),
            ([only], _) | ([], [only]) => Ok(*only),
            _ => {
                let mut candidates: Vec<&ChatDump> =
                    exact.iter().chain(partial.iter()).copied().collect();
                candidates.sort_by_key(|c| c.title.to_lowercase());
                let listed = candidates
                    .iter()
                    .map(|c| match &c.username {
                        Some(u) => format!("{} (@{u}, ID: {})", c.title, c.id),
                        None => format!("{} (ID: {})", c.title, c.id),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(ExportError::chat_resolution(
                    identifier,
                    format!("{} chats match: {listed}", candidates.len()),
                ))
            }
        }
    }
}

/// Parses a numeric chat identifier, dropping the `-100` channel prefix.
fn parse_chat_id(identifier: &str) -> Option<i64> {
    let digits = identifier.strip_prefix('-').unwrap_or(identifier);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match identifier.strip_prefix("-100") {
        Some(rest) if !rest.is_empty() => rest.parse().ok(),
        _ => identifier.parse().ok(),
    }
}

#[async_trait]
impl ChatSource for JsonDumpSource {
    async fn resolve_chat(&self, identifier: &str) -> Result<ChatHandle> {
        let identifier = identifier.trim();
        let chat = match parse_chat_id(identifier) {
            Some(id) => self
                .dump
                .chats
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| ExportError::chat_resolution(identifier, "no chat with that id"))?,
            None => self.by_name(identifier)?,
        };
        info!(chat_id = chat.id, title = %chat.title, "resolved chat");
        Ok(chat.handle())
    }

    async fn list_topics(&self, chat: &ChatHandle) -> Result<TopicListing> {
        let chat = self.chat(chat)?;
        if !chat.is_forum {
            return Ok(TopicListing::NotForum);
        }
        Ok(TopicListing::Forum(
            chat.topics.iter().map(|t| (t.id, t.title.clone())).collect(),
        ))
    }

    fn iter_messages<'a>(
        &'a self,
        chat: &'a ChatHandle,
        topic_id: Option<u64>,
    ) -> BoxStream<'a, Result<RawMessage>> {
        let chat = match self.chat(chat) {
            Ok(chat) => chat,
            Err(err) => return stream::once(async move { Err(err) }).boxed(),
        };
        let is_forum = chat.is_forum;
        stream::iter(
            chat.messages
                .iter()
                .filter(move |m| topic_id.is_none_or(|t| topic_of(m, is_forum) == t))
                .cloned()
                .map(Ok),
        )
        .boxed()
    }

    async fn download(&self, message: &RawMessage, destination: &Path) -> Result<Option<PathBuf>> {
        let Some(location) = message.media.as_ref().and_then(|m| m.location()) else {
            return Ok(None);
        };
        if !is_contained(Path::new(location)) {
            return Err(ExportError::media_download(
                message.id,
                format!("media location escapes the media root: {location}"),
            ));
        }
        let from = self.media_root.join(location);
        fs::copy(&from, destination).await.map_err(|e| {
            ExportError::media_download(message.id, format!("{}: {e}", from.display()))
        })?;
        debug!(message_id = message.id, to = %destination.display(), "copied media");
        Ok(Some(destination.to_path_buf()))
    }
}

/// True if `location` only descends from the directory it is joined to.
fn is_contained(location: &Path) -> bool {
    location
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn dump() -> JsonDumpSource {
        let value = json!({
            "chats": [
                {"id": 1001, "title": "Rust Users", "username": "rustusers"},
                {"id": 1002, "title": "Rust Forum", "is_forum": true,
                 "topics": [{"id": 5, "title": "Releases"}, {"id": 9, "title": "Спам"}],
                 "messages": [
                    {"id": 5, "date": "2024-01-15T10:00:00Z", "action": {"type": "topic_create"}},
                    {"id": 6, "date": "2024-01-15T10:01:00Z", "text": "1.75",
                     "reply_to": {"reply_to_msg_id": 5, "forum_topic": true}},
                    {"id": 7, "date": "2024-01-15T10:02:00Z", "text": "buy now",
                     "reply_to": {"reply_to_msg_id": 9, "forum_topic": true}},
                    {"id": 8, "date": "2024-01-15T10:03:00Z", "text": "hello general"}
                 ]},
                {"id": 1003, "title": "Go Users"}
            ]
        });
        let dump: DumpFile = serde_json::from_value(value).unwrap();
        JsonDumpSource::from_dump(dump, "/data")
    }

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(parse_chat_id("1001"), Some(1001));
        assert_eq!(parse_chat_id("-1001234567"), Some(1_234_567));
        assert_eq!(parse_chat_id("-42"), Some(-42));
        assert_eq!(parse_chat_id("@rust"), None);
        assert_eq!(parse_chat_id("-"), None);
    }

    #[tokio::test]
    async fn test_resolve_by_id_username_and_title() {
        let source = dump();
        assert_eq!(source.resolve_chat("1002").await.unwrap().title, "Rust Forum");
        assert_eq!(source.resolve_chat("-1001002").await.unwrap().id, 1002);
        assert_eq!(source.resolve_chat("@RustUsers").await.unwrap().id, 1001);
        assert_eq!(source.resolve_chat("rust forum").await.unwrap().id, 1002);
        assert_eq!(source.resolve_chat("Go").await.unwrap().id, 1003);
    }

    #[tokio::test]
    async fn test_resolve_ambiguous_and_missing() {
        let source = dump();
        let err = source.resolve_chat("Rust").await.unwrap_err();
        assert!(err.is_chat_resolution());
        assert!(err.to_string().contains("2 chats match"));

        assert!(source.resolve_chat("Python").await.unwrap_err().is_chat_resolution());
        assert!(source.resolve_chat("4242").await.unwrap_err().is_chat_resolution());
    }

    #[tokio::test]
    async fn test_list_topics() {
        let source = dump();
        let flat = source.resolve_chat("1001").await.unwrap();
        assert_eq!(source.list_topics(&flat).await.unwrap(), TopicListing::NotForum);

        let forum = source.resolve_chat("1002").await.unwrap();
        match source.list_topics(&forum).await.unwrap() {
            TopicListing::Forum(topics) => assert_eq!(topics.len(), 2),
            TopicListing::NotForum => panic!("expected a forum"),
        }
    }

    #[tokio::test]
    async fn test_iter_messages_by_topic() {
        let source = dump();
        let forum = source.resolve_chat("1002").await.unwrap();

        let ids = |msgs: Vec<RawMessage>| msgs.into_iter().map(|m| m.id).collect::<Vec<_>>();
        let releases: Vec<RawMessage> = source.iter_messages(&forum, Some(5)).try_collect().await.unwrap();
        assert_eq!(ids(releases), vec![5, 6]);

        let general: Vec<RawMessage> = source.iter_messages(&forum, Some(1)).try_collect().await.unwrap();
        assert_eq!(ids(general), vec![8]);

        let all: Vec<RawMessage> = source.iter_messages(&forum, None).try_collect().await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_download_copies_from_media_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("media")).unwrap();
        std::fs::write(dir.path().join("media/cat.jpg"), b"jpeg").unwrap();

        let dump = DumpFile {
            media_root: Some(PathBuf::from("media")),
            chats: Vec::new(),
        };
        let source = JsonDumpSource::from_dump(dump, dir.path());
        let msg = RawMessage::new(1, chrono::Utc::now())
            .with_media(crate::message::MediaPayload::photo().at("cat.jpg"));

        let dest = dir.path().join("out.jpg");
        let path = source.download(&msg, &dest).await.unwrap();
        assert_eq!(path.as_deref(), Some(dest.as_path()));
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg");

        let missing = RawMessage::new(2, chrono::Utc::now())
            .with_media(crate::message::MediaPayload::photo().at("nope.jpg"));
        let err = source.download(&missing, &dest).await.unwrap_err();
        assert!(matches!(err, ExportError::MediaDownload { message_id: 2, .. }));

        let no_media = RawMessage::new(3, chrono::Utc::now());
        assert_eq!(source.download(&no_media, &dest).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_download_rejects_paths_outside_media_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("media")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let dump = DumpFile {
            media_root: Some(PathBuf::from("media")),
            chats: Vec::new(),
        };
        let source = JsonDumpSource::from_dump(dump, dir.path());
        let dest = dir.path().join("out.bin");

        let absolute = dir.path().join("secret.txt");
        for location in ["../secret.txt", "sub/../../secret.txt", absolute.to_str().unwrap()] {
            let msg = RawMessage::new(4, chrono::Utc::now())
                .with_media(crate::message::MediaPayload::photo().at(location));
            let err = source.download(&msg, &dest).await.unwrap_err();
            assert!(matches!(err, ExportError::MediaDownload { message_id: 4, .. }), "{location}");
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("cat.jpg")));
        assert!(is_contained(Path::new("./photos/cat.jpg")));
        assert!(!is_contained(Path::new("../cat.jpg")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}
