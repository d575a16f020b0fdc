//! Media attachments: classification, naming, skip policy and batched downloads.
//!
//! [`MediaPipeline`] turns raw messages carrying media into HTML snippets.
//! Each message gets a [`MediaJob`] with a unique filename; jobs are
//! downloaded in strict batches of `max_concurrent_downloads`, every batch
//! fully joined before the next one starts.
//!
//! # Filenames
//!
//! ```text
//! msg_{message id}_{run sequence}_{media type}[_{original stem}]{extension}
//! ```
//!
//! The run sequence is owned by the pipeline instance and starts at 1. The
//! filename doubles as the dedup key: a filename already downloaded in this
//! run is never fetched again.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{MediaConfig, defaults};
use crate::core::references::skip_reason;
use crate::core::retry::RetryPolicy;
use crate::error::Result;
use crate::message::{DocumentFlavor, MediaPayload, RawMessage};
use crate::progress::{Phase, ProgressCallback, ProgressReporter, no_progress};
use crate::render::escape_html;
use crate::source::ChatSource;

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
    VideoNote,
    Voice,
    Audio,
    Gif,
    Document,
    Unknown,
}

impl MediaType {
    /// Every type that can be configured for skipping.
    pub fn all() -> &'static [MediaType] {
        &[
            MediaType::Photo,
            MediaType::Video,
            MediaType::VideoNote,
            MediaType::Voice,
            MediaType::Audio,
            MediaType::Gif,
            MediaType::Document,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
            MediaType::VideoNote => "video_note",
            MediaType::Voice => "voice",
            MediaType::Audio => "audio",
            MediaType::Gif => "gif",
            MediaType::Document => "document",
            MediaType::Unknown => "unknown",
        }
    }

    /// Extension used when the original filename has none.
    fn default_extension(&self) -> Option<&'static str> {
        match self {
            MediaType::Photo => Some(".jpg"),
            MediaType::Video | MediaType::VideoNote => Some(".mp4"),
            MediaType::Voice => Some(".ogg"),
            MediaType::Audio => Some(".mp3"),
            MediaType::Gif => Some(".gif"),
            MediaType::Document | MediaType::Unknown => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DocumentFlavor> for MediaType {
    fn from(flavor: DocumentFlavor) -> Self {
        match flavor {
            DocumentFlavor::Video => MediaType::Video,
            DocumentFlavor::VideoNote => MediaType::VideoNote,
            DocumentFlavor::Voice => MediaType::Voice,
            DocumentFlavor::Audio => MediaType::Audio,
            DocumentFlavor::Gif => MediaType::Gif,
        }
    }
}

/// Classifies a media payload.
pub fn media_type_of(media: &MediaPayload) -> MediaType {
    match media {
        MediaPayload::Photo { .. } => MediaType::Photo,
        MediaPayload::Document(doc) => doc.flavor.map_or(MediaType::Document, MediaType::from),
        MediaPayload::Other { .. } => MediaType::Unknown,
    }
}

/// Size of the payload in bytes. Only documents report one.
pub fn media_size(media: &MediaPayload) -> u64 {
    media.document().map_or(0, |doc| doc.size)
}

/// Infers the file extension, including the leading dot.
///
/// Priority: original filename suffix, then the type default, then the MIME
/// type for generic documents, then `.bin`.
pub fn file_extension(media: &MediaPayload) -> String {
    if let Some(ext) = original_name(media)
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
    {
        return format!(".{ext}");
    }

    let media_type = media_type_of(media);
    if let Some(ext) = media_type.default_extension() {
        return ext.to_string();
    }

    if media_type == MediaType::Document {
        let mime = media
            .document()
            .and_then(|doc| doc.mime_type.as_deref())
            .unwrap_or_default();
        if let Some(ext) = extension_for_mime(mime) {
            return ext.to_string();
        }
    }

    ".bin".to_string()
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    if mime.contains("pdf") {
        Some(".pdf")
    } else if mime.contains("image") {
        Some(if mime.contains("webp") {
            ".webp"
        } else if mime.contains("png") {
            ".png"
        } else if mime.contains("gif") {
            ".gif"
        } else {
            ".jpg"
        })
    } else if mime.contains("video") {
        Some(".mp4")
    } else if mime.contains("audio") {
        Some(".mp3")
    } else if mime.contains("text") {
        Some(".txt")
    } else if mime.contains("zip") || mime.contains("archive") {
        Some(".zip")
    } else {
        None
    }
}

fn original_name(media: &MediaPayload) -> Option<&str> {
    media
        .document()
        .and_then(|doc| doc.file_name.as_deref())
        .filter(|name| !name.is_empty())
}

/// Makes a user-supplied name safe to use as a path component.
///
/// Drops any directory part, replaces reserved characters with `_`, trims
/// dots and spaces from both ends and caps the length. Returns `None` if
/// nothing is left.
///
/// ```rust
/// use chatarchive::core::media::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
/// assert_eq!(sanitize_filename("a<b>:c").as_deref(), Some("a_b__c"));
/// assert_eq!(sanitize_filename(" .. "), None);
/// ```
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let replaced: String = base
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(['.', ' ']);

    let limit = defaults::MAX_FILENAME_LENGTH;
    let result = if trimmed.chars().count() > limit {
        match trimmed.rfind('.').filter(|&i| i > 0) {
            Some(dot) => {
                let (stem, ext) = trimmed.split_at(dot);
                let keep = limit.saturating_sub(ext.chars().count()).max(1);
                let stem: String = stem.chars().take(keep).collect();
                format!("{stem}{ext}")
            }
            None => trimmed.chars().take(limit).collect(),
        }
    } else {
        trimmed.to_string()
    };

    (!result.is_empty()).then_some(result)
}

/// Renders the HTML snippet for a downloaded file.
///
/// `rel_path` is relative to the output document.
pub fn media_html(media_type: MediaType, rel_path: &str) -> String {
    let src = escape_html(rel_path);
    match media_type {
        MediaType::Photo => format!(r#"<img src="{src}" loading="lazy" alt="Image">"#),
        MediaType::Gif => format!(r#"<img src="{src}" loading="lazy" alt="GIF">"#),
        MediaType::Voice | MediaType::Audio => format!(
            r#"<audio controls src="{src}">Your browser does not support audio.</audio>"#
        ),
        MediaType::Video | MediaType::VideoNote | MediaType::Document => {
            let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
            format!(r#"<a href="{src}" download>📄 {}</a>"#, escape_html(name))
        }
        MediaType::Unknown => format!(r#"<a href="{src}">📎 Media file</a>"#),
    }
}

/// One planned download.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaJob<'a> {
    pub message: &'a RawMessage,
    pub media_type: MediaType,
    /// Unique filename inside the media directory; also the dedup key.
    pub filename: String,
}

/// HTML produced for one message's media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOutcome {
    pub message_id: u64,
    pub html: String,
}

/// Counters for one [`MediaPipeline::download`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStats {
    pub downloaded: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub empty: usize,
}

/// Downloads media for one export run.
pub struct MediaPipeline {
    config: MediaConfig,
    media_dir: PathBuf,
    output_dir: PathBuf,
    retry: RetryPolicy,
    progress: ProgressCallback,
    counter: u64,
    downloaded: HashSet<String>,
}

impl fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("config", &self.config)
            .field("media_dir", &self.media_dir)
            .field("counter", &self.counter)
            .field("downloaded", &self.downloaded.len())
            .finish_non_exhaustive()
    }
}

impl MediaPipeline {
    /// `output_dir` is the directory of the output document; snippet paths
    /// are made relative to it.
    pub fn new(config: MediaConfig, media_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let config = MediaConfig {
            max_concurrent_downloads: config.max_concurrent_downloads.max(1),
            ..config
        };
        info!(
            max_concurrent_downloads = config.max_concurrent_downloads,
            "media pipeline ready"
        );
        Self {
            config,
            media_dir: media_dir.into(),
            output_dir: output_dir.into(),
            retry: RetryPolicy::default(),
            progress: no_progress(),
            counter: 0,
            downloaded: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Number of distinct files downloaded so far in this run.
    pub fn downloaded_count(&self) -> usize {
        self.downloaded.len()
    }

    /// Returns `true` if the message has no media or its media is outside
    /// the configured policy.
    pub fn should_skip(&self, msg: &RawMessage) -> bool {
        !msg.has_media() || skip_reason(msg, &self.config).is_some()
    }

    fn next_sequence(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    /// Builds the unique filename for `media` attached to `message_id`,
    /// consuming one sequence number.
    pub fn unique_filename(&mut self, message_id: u64, media: &MediaPayload) -> String {
        let sequence = self.next_sequence();
        let media_type = media_type_of(media);
        let stem = original_name(media)
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| sanitize_filename(&stem.to_string_lossy()));
        let ext = file_extension(media);

        let filename = match stem {
            Some(stem) => format!("msg_{message_id}_{sequence}_{media_type}_{stem}{ext}"),
            None => format!("msg_{message_id}_{sequence}_{media_type}{ext}"),
        };
        debug!(message_id, %filename, "generated media filename");
        filename
    }

    /// Plans the download for one message, or returns `None` if it is
    /// skipped.
    pub fn plan<'a>(&mut self, msg: &'a RawMessage) -> Option<MediaJob<'a>> {
        if self.should_skip(msg) {
            return None;
        }
        let media = msg.media.as_ref()?;
        let filename = self.unique_filename(msg.id, media);
        Some(MediaJob {
            message: msg,
            media_type: media_type_of(media),
            filename,
        })
    }

    /// Plans and downloads media for every admissible message.
    pub async fn process<'a, S>(
        &mut self,
        source: &S,
        messages: impl IntoIterator<Item = &'a RawMessage>,
    ) -> (Vec<MediaOutcome>, MediaStats)
    where
        S: ChatSource + ?Sized,
    {
        let jobs: Vec<MediaJob<'a>> = messages.into_iter().filter_map(|m| self.plan(m)).collect();
        self.download(source, jobs).await
    }

    /// Downloads planned jobs in strict batches.
    ///
    /// Failures are logged and yield no outcome; they never abort the run.
    /// The dedup set is updated only after each batch is joined.
    pub async fn download<S>(&mut self, source: &S, jobs: Vec<MediaJob<'_>>) -> (Vec<MediaOutcome>, MediaStats)
    where
        S: ChatSource + ?Sized,
    {
        let total = jobs.len();
        let batch_size = self.config.max_concurrent_downloads;
        let reporter = ProgressReporter::new(Phase::Downloading, batch_size, self.progress.clone());
        let mut outcomes = Vec::new();
        let mut stats = MediaStats::default();
        let mut done = 0;

        for batch in jobs.chunks(batch_size) {
            let mut in_batch = HashSet::new();
            let runnable: Vec<&MediaJob<'_>> = batch
                .iter()
                .filter(|job| {
                    let fresh = !self.downloaded.contains(&job.filename)
                        && in_batch.insert(job.filename.as_str());
                    if !fresh {
                        debug!(filename = %job.filename, "already downloaded, skipping");
                    }
                    fresh
                })
                .collect();
            stats.duplicates += batch.len() - runnable.len();

            let results = {
                let this = &*self;
                join_all(runnable.iter().map(|job| this.fetch(source, job))).await
            };

            for (job, result) in runnable.into_iter().zip(results) {
                match result {
                    Ok(Some(path)) => {
                        self.downloaded.insert(job.filename.clone());
                        stats.downloaded += 1;
                        outcomes.push(MediaOutcome {
                            message_id: job.message.id,
                            html: media_html(job.media_type, &self.relative_path(&path)),
                        });
                    }
                    Ok(None) => {
                        stats.empty += 1;
                        debug!(message_id = job.message.id, "source produced no file");
                    }
                    Err(err) => {
                        stats.failed += 1;
                        error!(message_id = job.message.id, "media download failed: {err}");
                    }
                }
            }

            done += batch.len();
            reporter.emit(done, Some(total));
        }

        (outcomes, stats)
    }

    async fn fetch<S>(&self, source: &S, job: &MediaJob<'_>) -> Result<Option<PathBuf>>
    where
        S: ChatSource + ?Sized,
    {
        let destination = self.media_dir.join(&job.filename);
        let message = job.message;
        let dest = destination.as_path();
        debug!(message_id = message.id, "starting media download");
        self.retry
            .run("media download", move || source.download(message, dest))
            .await
    }

    /// Path of a downloaded file relative to the output document, with
    /// forward slashes.
    fn relative_path(&self, path: &Path) -> String {
        let rel = path
            .strip_prefix(&self.output_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| {
                let dir = self.media_dir.file_name().map(PathBuf::from).unwrap_or_default();
                dir.join(path.file_name().unwrap_or(path.as_os_str()))
            });
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
