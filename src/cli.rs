//! Command-line interface definition using clap.
//!
//! This module defines:
//! - [`Args`] - CLI argument structure (for use with clap)
//! - [`MediaKind`] - Media types accepted by `--skip-media-types`
//!
//! [`Args::into_config`] turns parsed arguments into a validated
//! [`ExportConfig`]:
//!
//! ```rust
//! use chatarchive::cli::Args;
//! use clap::Parser;
//!
//! let args = Args::parse_from([
//!     "chatarchive", "--chat", "@rustlang", "--dump", "dump.json",
//!     "--skip-media-types", "video", "voice",
//!     "--filter-include", "release",
//! ]);
//! let config = args.into_config().unwrap();
//! assert_eq!(config.skip_media_types.len(), 2);
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::{ExportConfig, defaults, parse_timezone};
use crate::core::media::MediaType;
use crate::error::Result;

/// Export a chat's history into a single self-contained HTML archive.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatarchive")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    chatarchive --chat -1001234567890 --dump dump.json --output my_chat.html
    chatarchive --chat @rustlang --dump dump.json --skip-media
    chatarchive --chat \"Team\" --dump dump.json --exclude-topics Spam Ads
    chatarchive --chat \"Team\" --dump dump.json --filter-include bug --filter-ignore-case")]
pub struct Args {
    /// Chat id, @username or title
    #[arg(long, value_name = "CHAT", allow_hyphen_values = true)]
    pub chat: String,

    /// JSON dump to read messages and media from
    #[arg(long, value_name = "PATH")]
    pub dump: PathBuf,

    /// Path of the HTML file to write
    #[arg(short, long, default_value = defaults::OUTPUT_PATH)]
    pub output: PathBuf,

    /// Skip files larger than this many megabytes
    #[arg(long, value_name = "MB", default_value_t = defaults::MAX_FILE_SIZE_MB)]
    pub max_file_size: u64,

    /// Downloads in flight at once
    #[arg(long, value_name = "N", default_value_t = defaults::MAX_CONCURRENT_DOWNLOADS)]
    pub max_downloads: usize,

    /// Do not download any media
    #[arg(long)]
    pub skip_media: bool,

    /// Media types not to download
    #[arg(long, value_enum, num_args = 1.., value_name = "TYPE")]
    pub skip_media_types: Vec<MediaKind>,

    /// Topic titles to export (cannot be combined with --exclude-topics)
    #[arg(long, num_args = 1.., value_name = "TITLE", conflicts_with = "exclude_topics")]
    pub include_topics: Vec<String>,

    /// Topic titles to leave out (cannot be combined with --include-topics)
    #[arg(long, num_args = 1.., value_name = "TITLE")]
    pub exclude_topics: Vec<String>,

    /// IANA timezone for message dates
    #[arg(long, visible_alias = "tz", default_value = defaults::TIMEZONE)]
    pub timezone: String,

    /// strftime format for message dates
    #[arg(long, default_value = defaults::DATE_FORMAT)]
    pub date_format: String,

    /// Keep only messages containing one of these substrings
    #[arg(long, num_args = 1.., value_name = "TEXT")]
    pub filter_include: Vec<String>,

    /// Drop messages containing any of these substrings (wins over --filter-include)
    #[arg(long, num_args = 1.., value_name = "TEXT")]
    pub filter_exclude: Vec<String>,

    /// Match filter substrings regardless of case
    #[arg(long)]
    pub filter_ignore_case: bool,

    /// Log collection progress every N messages
    #[arg(long, value_name = "N", default_value_t = defaults::PROGRESS_LOG_INTERVAL)]
    pub progress_interval: usize,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Builds and validates the export configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone is unknown or the configuration
    /// fails [`ExportConfig::validate`].
    pub fn into_config(self) -> Result<ExportConfig> {
        let timezone = parse_timezone(&self.timezone)?;

        let mut config = ExportConfig::new(self.chat, self.output)
            .with_max_file_size_mb(self.max_file_size)
            .with_max_concurrent_downloads(self.max_downloads)
            .with_included_topics(self.include_topics)
            .with_excluded_topics(self.exclude_topics)
            .with_timezone(timezone)
            .with_date_format(self.date_format)
            .with_include_substrings(self.filter_include)
            .with_exclude_substrings(self.filter_exclude)
            .with_case_sensitive(!self.filter_ignore_case)
            .with_progress_log_interval(self.progress_interval);

        config = if self.skip_media {
            config.with_skip_all_media()
        } else {
            config.with_skip_media_types(self.skip_media_types.into_iter().map(MediaType::from))
        };

        config.validate()?;
        Ok(config)
    }
}

/// Media types accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    #[value(name = "video_note")]
    VideoNote,
    Voice,
    Audio,
    Gif,
    Document,
}

impl From<MediaKind> for MediaType {
    fn from(kind: MediaKind) -> MediaType {
        match kind {
            MediaKind::Photo => MediaType::Photo,
            MediaKind::Video => MediaType::Video,
            MediaKind::VideoNote => MediaType::VideoNote,
            MediaKind::Voice => MediaType::Voice,
            MediaKind::Audio => MediaType::Audio,
            MediaKind::Gif => MediaType::Gif,
            MediaKind::Document => MediaType::Document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["chatarchive", "--chat", "Team", "--dump", "dump.json"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config.output_path, PathBuf::from("telegram_export.html"));
        assert_eq!(config.max_file_size_mb, 50);
        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
        assert!(config.case_sensitive);
        assert!(config.skip_media_types.is_empty());
    }

    #[test]
    fn test_negative_chat_id() {
        let args = Args::parse_from(["chatarchive", "--chat", "-1001234567890", "--dump", "d.json"]);
        assert_eq!(args.chat, "-1001234567890");
    }

    #[test]
    fn test_skip_media_expands_to_all_types() {
        let config = parse(&["--skip-media"]).into_config().unwrap();
        assert_eq!(config.skip_media_types.len(), MediaType::all().len());
    }

    #[test]
    fn test_media_kinds() {
        let config = parse(&["--skip-media-types", "video_note", "gif"])
            .into_config()
            .unwrap();
        assert!(config.skip_media_types.contains(&MediaType::VideoNote));
        assert!(config.skip_media_types.contains(&MediaType::Gif));
        assert!(!config.skip_media_types.contains(&MediaType::Photo));
    }

    #[test]
    fn test_topic_lists_conflict() {
        let result = Args::try_parse_from([
            "chatarchive",
            "--chat",
            "Team",
            "--dump",
            "d.json",
            "--include-topics",
            "News",
            "--exclude-topics",
            "Spam",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_flags() {
        let config = parse(&[
            "--filter-include",
            "bug",
            "crash",
            "--filter-exclude",
            "spam",
            "--filter-ignore-case",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.include_substrings.len(), 2);
        assert!(config.exclude_substrings.contains("spam"));
        assert!(!config.case_sensitive);
    }

    #[test]
    fn test_invalid_timezone() {
        let err = parse(&["--timezone", "Mars/Olympus"]).into_config().unwrap_err();
        assert!(matches!(err, ExportError::InvalidTimezone { .. }));
    }

    #[test]
    fn test_zero_downloads_rejected() {
        let err = parse(&["--max-downloads", "0"]).into_config().unwrap_err();
        assert!(err.is_validation());
    }
}
