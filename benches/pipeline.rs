//! Benchmarks for the in-memory stages of the export pipeline.
//!
//! Run with: `cargo bench`
//! Run specific group: `cargo bench --bench pipeline -- rewrite`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chatarchive::config::ExportConfig;
use chatarchive::core::{
    ContentFilter, LinkRewriter, MessagePipeline, Topic, TopicMap, apply_filter, group_messages,
};
use chatarchive::message::{RawMessage, Sender};
use chatarchive::render::{HtmlRenderer, Renderer, prepare_topics};

use chrono::{Duration, TimeZone, Utc};

// =============================================================================
// Test Data Generators
// =============================================================================

/// Every fifth message starts a three-message album; every seventh links to
/// an earlier message of the same chat.
fn generate_messages(count: usize) -> Vec<RawMessage> {
    let base = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let id = i as u64 + 1;
            let sender = if i % 2 == 0 {
                Sender::new(1, "Alice")
            } else {
                Sender::new(2, "Bob").with_username("bob")
            };
            let text = if i % 7 == 0 && i > 0 {
                format!(r#"see <a href="https://t.me/c/100/{}">earlier</a>"#, id - 1)
            } else if i % 3 == 0 {
                format!("bug report number {i}")
            } else {
                format!("Message number {i}")
            };
            let msg = RawMessage::new(id, base + Duration::seconds(i as i64 * 30))
                .with_sender(sender)
                .with_text(text);
            if i % 5 < 3 && (i / 5) % 2 == 0 {
                msg.with_group((i / 5) as i64)
            } else {
                msg
            }
        })
        .collect()
}

fn forum_html(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                r#"<p>part {i} <a href="https://t.me/c/100/{}/{}" class="mention">link</a> and <a href="https://t.me/c/200/3">other</a></p>"#,
                i % 10 + 1,
                i + 100
            )
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_messages");

    for size in [100_usize, 1_000, 10_000, 100_000] {
        let messages = generate_messages(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &messages, |b, messages| {
            b.iter(|| black_box(group_messages(black_box(messages.clone()))));
        });
    }
    group.finish();
}

fn bench_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_filter");
    let filter = ContentFilter::new()
        .with_include(["bug"])
        .with_exclude(["number 9"])
        .with_case_sensitive(false);

    for size in [100_usize, 1_000, 10_000, 100_000] {
        let grouped = group_messages(generate_messages(size));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &grouped, |b, grouped| {
            b.iter(|| black_box(apply_filter(black_box(grouped.clone()), &filter)));
        });
    }
    group.finish();
}

fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");
    let forum = LinkRewriter::new(100, true);
    let flat = LinkRewriter::new(100, false);

    for size in [10_usize, 100, 1_000] {
        let html = forum_html(size);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("forum", size), &html, |b, html| {
            b.iter(|| black_box(forum.rewrite(black_box(html))));
        });
        group.bench_with_input(BenchmarkId::new("flat", size), &html, |b, html| {
            b.iter(|| black_box(flat.rewrite(black_box(html))));
        });
    }
    group.finish();
}

fn bench_text_pass_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_pass_render");
    let config = ExportConfig::new("bench", "bench.html").with_timezone(chrono_tz::UTC);
    let pipeline = MessagePipeline::new(&config, LinkRewriter::new(100, false));

    for size in [100_usize, 1_000, 10_000] {
        let items = group_messages(generate_messages(size)).into_sorted_items();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| {
                let mut topics = TopicMap::from([(1, Topic::general())]);
                pipeline.text_pass(items, &mut topics, 1, false);
                let prepared = prepare_topics(topics);
                black_box(HtmlRenderer::new().render("bench", &prepared))
            });
        });
    }
    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(
    benches,
    bench_grouping,
    bench_filtering,
    bench_rewrite,
    bench_text_pass_and_render,
);

criterion_main!(benches);
