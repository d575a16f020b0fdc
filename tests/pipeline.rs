//! End-to-end export runs against an in-memory source.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chatarchive::message::{MediaPayload, ReplyHeader, Sender, ServiceAction};
use chatarchive::prelude::*;
use chrono::{TimeZone, Utc};
use tempfile::{TempDir, tempdir};

// ============================================================================
// Helpers
// ============================================================================

fn msg(id: u64) -> RawMessage {
    let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap() + chrono::Duration::minutes(id as i64);
    RawMessage::new(id, date).with_sender(Sender::new(7, "Alice"))
}

fn config(dir: &TempDir, chat: &str) -> ExportConfig {
    ExportConfig::new(chat, dir.path().join("archive.html"))
        .with_timezone(chrono_tz::UTC)
        .with_retry(1, Duration::ZERO)
}

fn read_output(path: &Path) -> String {
    fs::read_to_string(path).expect("output should be written")
}

fn position(html: &str, needle: &str) -> usize {
    html.find(needle)
        .unwrap_or_else(|| panic!("{needle} not found in output"))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_plain_messages_newest_first() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team").with_messages([
        msg(1).with_text("first"),
        msg(3).with_text("third"),
        msg(2).with_text("second"),
    ]);

    let result = Exporter::new(source).export(&config(&dir, "Team")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_messages, 3);
    assert_eq!(result.total_topics, 1);
    assert_eq!(result.media_count, 0);

    let html = read_output(&result.output_path);
    assert!(html.contains(r#"id="topic-1""#));
    assert!(position(&html, r#"id="msg-3""#) < position(&html, r#"id="msg-2""#));
    assert!(position(&html, r#"id="msg-2""#) < position(&html, r#"id="msg-1""#));
}

#[tokio::test]
async fn test_album_becomes_one_record_with_both_images() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team")
        .with_messages([
            msg(10).with_group(555).with_text("holiday pics"),
            msg(11).with_group(555).with_media(MediaPayload::photo().at("a.jpg")),
            msg(12).with_group(555).with_media(MediaPayload::photo().at("b.jpg")),
        ])
        .with_file("a.jpg", b"a".to_vec())
        .with_file("b.jpg", b"b".to_vec());

    let result = Exporter::new(source).export(&config(&dir, "Team")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_messages, 1);
    assert_eq!(result.media_count, 2);

    let html = read_output(&result.output_path);
    assert_eq!(html.matches("<img").count(), 2);
    assert_eq!(html.matches(r#"class="message""#).count(), 1);
    assert!(position(&html, "holiday pics") < position(&html, "<img"));

    let media: Vec<_> = fs::read_dir(dir.path().join("archive_media"))
        .unwrap()
        .collect();
    assert_eq!(media.len(), 2);
}

#[tokio::test]
async fn test_include_filter_keeps_whole_album() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team").with_messages([
        msg(1).with_group(9).with_text("screenshot one"),
        msg(2).with_group(9).with_text("found a bug here"),
        msg(3).with_group(9).with_text("screenshot three"),
        msg(4).with_text("lunch?"),
    ]);

    let cfg = config(&dir, "Team").with_include_substrings(["bug"]);
    let result = Exporter::new(source).export(&cfg).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_messages, 1);

    let html = read_output(&result.output_path);
    assert!(html.contains("screenshot one"));
    assert!(html.contains("screenshot three"));
    assert!(!html.contains("lunch?"));
}

#[tokio::test]
async fn test_everything_filtered_renders_empty_document() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team")
        .with_messages([msg(1).with_text("hello"), msg(2).with_text("world")]);

    let cfg = config(&dir, "Team").with_include_substrings(["nothing matches"]);
    let result = Exporter::new(source).export(&cfg).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_messages, 0);
    assert_eq!(result.total_topics, 0);

    let html = read_output(&result.output_path);
    assert!(html.contains("Archive · Team (empty)"));
    assert!(html.contains("All messages were filtered out"));
}

#[tokio::test]
async fn test_excluded_forum_topic_never_appears() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Forum")
        .with_topics([(1, "General"), (5, "Спам"), (7, "News")])
        .with_messages([
            msg(2).with_text("welcome"),
            msg(5).with_action(ServiceAction::TopicCreate),
            msg(6).with_text("buy now").with_reply(ReplyHeader::in_topic(5)),
            msg(7).with_action(ServiceAction::TopicCreate),
            msg(8).with_text("release out").with_reply(ReplyHeader::in_topic(7)),
        ]);

    let cfg = config(&dir, "Forum").with_excluded_topics(["спам"]);
    let result = Exporter::new(source).export(&cfg).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_topics, 2);
    assert_eq!(result.total_messages, 3);

    let html = read_output(&result.output_path);
    assert!(!html.contains("topic-5"));
    assert!(!html.contains("buy now"));
    assert!(!html.contains(r#"id="msg-6""#));
    assert!(html.contains(r#"id="topic-7""#));
    assert!(html.contains("release out"));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_failed_download_does_not_abort_run() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team")
        .with_messages([
            msg(1).with_text("ok").with_media(MediaPayload::photo().at("ok.jpg")),
            msg(2).with_text("broken").with_media(MediaPayload::photo().at("bad.jpg")),
        ])
        .with_failing_download(2);

    let result = Exporter::new(source).export(&config(&dir, "Team")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_messages, 2);
    assert_eq!(result.media_count, 1);

    let html = read_output(&result.output_path);
    assert!(html.contains("broken"));
    assert_eq!(html.matches("<img").count(), 1);
}

#[tokio::test]
async fn test_skipped_media_keeps_reason() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team")
        .with_messages([msg(1).with_text("look").with_media(MediaPayload::photo().at("p.jpg"))]);

    let cfg = config(&dir, "Team").with_skip_media_types([MediaType::Photo]);
    let exporter = Exporter::new(source);
    let result = exporter.export(&cfg).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.media_count, 0);
    assert!(exporter.source().downloads().is_empty());
    assert!(read_output(&result.output_path).contains("contains photo"));
}

#[tokio::test]
async fn test_internal_links_become_anchors() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team").with_messages([
        msg(1).with_text("original"),
        msg(2).with_text(r#"see <a href="https://t.me/c/100/1">this</a>"#),
        msg(3).with_text(r#"and <a href="https://t.me/c/999/1">that</a>"#),
    ]);

    let result = Exporter::new(source).export(&config(&dir, "Team")).await;
    let html = read_output(&result.output_path);

    assert!(html.contains(r##"href="#msg-1""##));
    assert!(html.contains("internal-link"));
    assert!(html.contains(r#"href="https://t.me/c/999/1""#));
}

#[tokio::test]
async fn test_unknown_chat_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team");

    let result = Exporter::new(source).export(&config(&dir, "Nope")).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Nope"));
    assert!(!dir.path().join("archive.html").exists());
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_work() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new(100, "Team").with_messages([msg(1).with_text("hi")]);

    let cfg = config(&dir, "Team")
        .with_included_topics(["News"])
        .with_excluded_topics(["Spam"]);
    let result = Exporter::new(source).export(&cfg).await;

    assert!(!result.success);
    assert_eq!(result.total_messages, 0);
    assert!(!dir.path().join("archive_media").exists());
}
