//! Top-level export run.
//!
//! [`Exporter::export`] validates the configuration, prepares the output
//! directories, resolves the chat and its topics, runs the
//! [`MessagePipeline`] once per exported topic, renders the document and
//! saves it. The run never returns an error: failures end up in
//! [`ExportResult::error`].

use std::path::Path;

use tokio::fs;
use tracing::{error, info, warn};

use crate::config::ExportConfig;
use crate::core::links::LinkRewriter;
use crate::core::media::MediaPipeline;
use crate::core::models::{ExportResult, TopicMap, total_records};
use crate::core::pipeline::{MessagePipeline, TopicReport};
use crate::core::retry::RetryPolicy;
use crate::core::topics::{TopicSelection, resolve_topics};
use crate::error::{ExportError, Result};
use crate::progress::{ProgressCallback, log_progress};
use crate::render::{HtmlRenderer, Renderer, prepare_topics};
use crate::source::ChatSource;

/// Shown in the document when every message was filtered out.
pub const EMPTY_EXPORT_MESSAGE: &str =
    "All messages were filtered out. Check your filter settings.";

/// Runs exports against one source with one renderer.
pub struct Exporter<S, R = HtmlRenderer> {
    source: S,
    renderer: R,
    progress: ProgressCallback,
}

impl<S: ChatSource> Exporter<S, HtmlRenderer> {
    pub fn new(source: S) -> Self {
        Self::with_renderer(source, HtmlRenderer::new())
    }
}

impl<S: ChatSource, R: Renderer> Exporter<S, R> {
    pub fn with_renderer(source: S, renderer: R) -> Self {
        Self {
            source,
            renderer,
            progress: log_progress(),
        }
    }

    /// Replaces the progress callback used while collecting and downloading.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Exports the chat named in `config`.
    pub async fn export(&self, config: &ExportConfig) -> ExportResult {
        info!(chat = %config.chat_identifier, output = %config.output_path.display(), "starting export");

        match self.run(config).await {
            Ok(result) => result,
            Err(err) => {
                match &err {
                    ExportError::ChatResolution { .. } => error!("chat resolution failed: {err}"),
                    ExportError::Api(_) => error!("remote API error: {err}"),
                    _ => error!("export failed: {err}"),
                }
                ExportResult::failure(&config.output_path, err.to_string())
            }
        }
    }

    async fn run(&self, config: &ExportConfig) -> Result<ExportResult> {
        config.validate()?;

        let media_dir = config.media_dir();
        fs::create_dir_all(config.output_dir()).await?;
        fs::create_dir_all(&media_dir).await?;

        let retry = RetryPolicy::from_config(config);
        let chat = retry
            .run("resolve chat", || self.source.resolve_chat(&config.chat_identifier))
            .await?;
        info!(chat_id = chat.id, title = %chat.title, "resolved chat");

        let listing = retry
            .run("list topics", || self.source.list_topics(&chat))
            .await?;
        let resolved = resolve_topics(listing, &TopicSelection::from_config(config));
        let is_forum = resolved.is_forum;
        let mut topics: TopicMap = resolved.topics;

        let pipeline = MessagePipeline::new(config, LinkRewriter::new(chat.id, is_forum))
            .with_progress(self.progress.clone());
        let mut media = MediaPipeline::new(config.media(), &media_dir, config.output_dir())
            .with_retry(retry)
            .with_progress(self.progress.clone());

        let mut reports = Vec::new();
        if is_forum {
            info!("forum chat: processing {} topics one by one", topics.len());
            let ids: Vec<u64> = topics.keys().copied().collect();
            for topic_id in ids {
                let title = topics.get(&topic_id).map(|t| t.title.clone()).unwrap_or_default();
                info!(topic_id, %title, "processing topic");
                let report = pipeline
                    .run(&self.source, &chat, Some(topic_id), &mut topics, &mut media)
                    .await?;
                log_report(&report);
                reports.push(report);
            }
        } else {
            info!("flat chat: processing the whole history");
            let report = pipeline
                .run(&self.source, &chat, None, &mut topics, &mut media)
                .await?;
            log_report(&report);
            reports.push(report);
        }
        let excluded: usize = reports.iter().map(|r| r.excluded).sum();
        let failed_media: usize = reports.iter().map(|r| r.media.failed).sum();
        if failed_media > 0 {
            warn!(failed = failed_media, "some media files could not be downloaded");
        }

        let total_messages = total_records(&topics);
        let (document, total_topics) = if total_messages == 0 {
            info!("no messages left after filtering, writing an empty document");
            let bytes = self
                .renderer
                .render_empty(chat.display_name(), EMPTY_EXPORT_MESSAGE)?;
            (bytes, 0)
        } else {
            let prepared = prepare_topics(topics);
            info!(topics = prepared.len(), messages = total_messages, "rendering");
            let bytes = self.renderer.render(chat.display_name(), &prepared)?;
            (bytes, prepared.len())
        };

        save(&config.output_path, &document).await?;
        Ok(finish(config, total_messages, total_topics, excluded, media.downloaded_count()))
    }
}

fn log_report(report: &TopicReport) {
    info!(
        topic_id = report.topic_id,
        stage = %report.stage,
        collected = report.collected,
        excluded = report.excluded,
        records = report.records,
        media = report.media.downloaded,
        "topic done"
    );
}

async fn save(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes)
        .await
        .map_err(|source| ExportError::Save {
            path: path.to_path_buf(),
            source,
        })
}

fn finish(
    config: &ExportConfig,
    total_messages: usize,
    total_topics: usize,
    excluded: usize,
    media_count: usize,
) -> ExportResult {
    info!(
        output = %config.output_path.display(),
        topics = total_topics,
        messages = total_messages,
        excluded,
        media = media_count,
        "export finished"
    );
    ExportResult {
        success: true,
        output_path: config.output_path.clone(),
        total_messages,
        total_topics,
        media_count,
        error: None,
    }
}
