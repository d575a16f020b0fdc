//! Configuration types for an export run.
//!
//! This module provides clean configuration structs for library usage,
//! without any CLI framework dependencies. The CLI layer builds an
//! [`ExportConfig`] and calls [`ExportConfig::validate`] before any network
//! activity starts.
//!
//! # Example
//!
//! ```rust
//! use chatarchive::config::ExportConfig;
//!
//! # fn main() -> chatarchive::Result<()> {
//! let config = ExportConfig::new("@rustlang", "archive.html")
//!     .with_max_concurrent_downloads(8)
//!     .with_include_substrings(["release", "bug"])
//!     .with_case_sensitive(false)
//!     .with_timezone_name("UTC")?;
//!
//! config.validate()?;
//! assert!(config.media_dir().ends_with("archive_media"));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::media::MediaType;
use crate::core::references::is_valid_date_format;
use crate::error::{ExportError, Result};

/// Application defaults.
pub mod defaults {
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 5;
    pub const MAX_FILENAME_LENGTH: usize = 255;
    pub const MAX_FILE_SIZE_MB: u64 = 50;
    pub const PROGRESS_LOG_INTERVAL: usize = 100;
    pub const RETRY_ATTEMPTS: u32 = 3;
    pub const RETRY_DELAY_MS: u64 = 1000;
    pub const TIMEZONE: &str = "Europe/Moscow";
    pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    pub const OUTPUT_PATH: &str = "telegram_export.html";
}

/// Full configuration consumed by the export pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Chat id, title, or `@username`.
    pub chat_identifier: String,

    /// Path of the HTML document to write.
    pub output_path: PathBuf,

    /// Media types never downloaded.
    #[serde(default)]
    pub skip_media_types: BTreeSet<MediaType>,

    /// Topic titles to keep (allow-list). Exclusive with `excluded_topics`.
    #[serde(default)]
    pub included_topics: BTreeSet<String>,

    /// Topic titles to drop (deny-list). Exclusive with `included_topics`.
    #[serde(default)]
    pub excluded_topics: BTreeSet<String>,

    /// Files larger than this are skipped (default: 50).
    pub max_file_size_mb: u64,

    /// Downloads in flight at once; also the media batch size (default: 5).
    pub max_concurrent_downloads: usize,

    /// Timezone message dates are shown in (default: Europe/Moscow).
    pub timezone: Tz,

    /// strftime-style format for message dates.
    pub date_format: String,

    /// Keep only messages containing at least one of these.
    #[serde(default)]
    pub include_substrings: BTreeSet<String>,

    /// Drop messages containing any of these. Wins over the include set.
    #[serde(default)]
    pub exclude_substrings: BTreeSet<String>,

    /// Substring matching respects case (default: true).
    pub case_sensitive: bool,

    /// Log collection progress every N messages (default: 100).
    pub progress_log_interval: usize,

    /// Attempts for retried remote operations (default: 3).
    pub retry_attempts: u32,

    /// Delay before the first retry; doubles per attempt (default: 1s).
    pub retry_base_delay_ms: u64,
}

impl ExportConfig {
    /// Creates a configuration with default values for everything but the
    /// chat and the output path.
    pub fn new(chat_identifier: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            chat_identifier: chat_identifier.into(),
            output_path: output_path.into(),
            skip_media_types: BTreeSet::new(),
            included_topics: BTreeSet::new(),
            excluded_topics: BTreeSet::new(),
            max_file_size_mb: defaults::MAX_FILE_SIZE_MB,
            max_concurrent_downloads: defaults::MAX_CONCURRENT_DOWNLOADS,
            timezone: chrono_tz::Europe::Moscow,
            date_format: defaults::DATE_FORMAT.to_string(),
            include_substrings: BTreeSet::new(),
            exclude_substrings: BTreeSet::new(),
            case_sensitive: true,
            progress_log_interval: defaults::PROGRESS_LOG_INTERVAL,
            retry_attempts: defaults::RETRY_ATTEMPTS,
            retry_base_delay_ms: defaults::RETRY_DELAY_MS,
        }
    }

    #[must_use]
    pub fn with_skip_media_types(mut self, types: impl IntoIterator<Item = MediaType>) -> Self {
        self.skip_media_types.extend(types);
        self
    }

    /// Skips every media type.
    #[must_use]
    pub fn with_skip_all_media(self) -> Self {
        self.with_skip_media_types(MediaType::all().iter().copied())
    }

    #[must_use]
    pub fn with_included_topics<S: Into<String>>(mut self, topics: impl IntoIterator<Item = S>) -> Self {
        self.included_topics.extend(topics.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_excluded_topics<S: Into<String>>(mut self, topics: impl IntoIterator<Item = S>) -> Self {
        self.excluded_topics.extend(topics.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size_mb = mb;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_downloads(mut self, n: usize) -> Self {
        self.max_concurrent_downloads = n;
        self
    }

    #[must_use]
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    /// Sets the timezone from an IANA name.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidTimezone`] if the name is unknown.
    pub fn with_timezone_name(mut self, name: &str) -> Result<Self> {
        self.timezone = parse_timezone(name)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    #[must_use]
    pub fn with_include_substrings<S: Into<String>>(mut self, subs: impl IntoIterator<Item = S>) -> Self {
        self.include_substrings.extend(subs.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_exclude_substrings<S: Into<String>>(mut self, subs: impl IntoIterator<Item = S>) -> Self {
        self.exclude_substrings.extend(subs.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = sensitive;
        self
    }

    #[must_use]
    pub fn with_progress_log_interval(mut self, n: usize) -> Self {
        self.progress_log_interval = n;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay_ms = u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Checks the configuration for contradictions.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] when:
    /// - both topic allow- and deny-lists are set
    /// - the chat identifier is blank
    /// - max file size, download concurrency, progress interval or retry
    ///   attempts is zero
    /// - the date format has an unknown specifier
    pub fn validate(&self) -> Result<()> {
        if self.chat_identifier.trim().is_empty() {
            return Err(ExportError::validation("chat identifier must not be empty"));
        }
        if !self.included_topics.is_empty() && !self.excluded_topics.is_empty() {
            return Err(ExportError::validation(
                "included and excluded topics cannot be used together; \
                 use either an allow-list or a deny-list",
            ));
        }
        if self.max_file_size_mb == 0 {
            return Err(ExportError::validation("max file size must be positive"));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(ExportError::validation(
                "max concurrent downloads must be positive",
            ));
        }
        if self.progress_log_interval == 0 {
            return Err(ExportError::validation(
                "progress log interval must be positive",
            ));
        }
        if self.retry_attempts == 0 {
            return Err(ExportError::validation("retry attempts must be positive"));
        }
        if !is_valid_date_format(&self.date_format) {
            return Err(ExportError::validation(format!(
                "invalid date format: {}",
                self.date_format
            )));
        }
        Ok(())
    }

    /// Directory that receives downloaded media: `<output stem>_media` next to
    /// the output document.
    pub fn media_dir(&self) -> PathBuf {
        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        self.output_dir().join(format!("{stem}_media"))
    }

    /// Directory that holds the output document.
    pub fn output_dir(&self) -> &Path {
        self.output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Media-related subset of this configuration.
    pub fn media(&self) -> MediaConfig {
        MediaConfig {
            max_file_size_mb: self.max_file_size_mb,
            skip_media_types: self.skip_media_types.clone(),
            max_concurrent_downloads: self.max_concurrent_downloads,
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Settings for the media pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    pub max_file_size_mb: u64,
    pub skip_media_types: BTreeSet<MediaType>,
    pub max_concurrent_downloads: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: defaults::MAX_FILE_SIZE_MB,
            skip_media_types: BTreeSet::new(),
            max_concurrent_downloads: defaults::MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

impl MediaConfig {
    /// Size ceiling in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Parses an IANA timezone name.
///
/// # Errors
///
/// Returns [`ExportError::InvalidTimezone`] if the name is unknown.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| ExportError::invalid_timezone(name))
}
