//! Unified error types for chatarchive.
//!
//! This module provides a single [`ExportError`] enum that covers every failure
//! an export run can hit, from configuration validation to media downloads.
//!
//! # Error Taxonomy
//!
//! | Variant | Fatal | Retried |
//! |---------|-------|---------|
//! | [`ChatResolution`](ExportError::ChatResolution) | yes | no |
//! | [`Api`](ExportError::Api) | after retries | yes |
//! | [`Io`](ExportError::Io) | after retries | yes |
//! | [`MediaDownload`](ExportError::MediaDownload) | never (per item) | yes |
//! | [`Validation`](ExportError::Validation) | yes, before any network activity | no |
//! | [`Render`](ExportError::Render) | yes | no |

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for chatarchive operations.
///
/// # Example
///
/// ```rust
/// use chatarchive::error::Result;
/// use chatarchive::core::models::DisplayRecord;
///
/// fn my_function() -> Result<Vec<DisplayRecord>> {
///     Ok(vec![])
/// }
/// ```
pub type Result<T> = std::result::Result<T, ExportError>;

/// The error type for all chatarchive operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// An I/O error occurred.
    ///
    /// This typically happens when:
    /// - The output directory cannot be created
    /// - A media file cannot be copied into the media directory
    /// - The final document cannot be written
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing error (message dumps, serialized configuration).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The chat identifier did not resolve to exactly one chat.
    #[error("Failed to resolve chat '{identifier}': {reason}")]
    ChatResolution {
        /// The identifier as given on the command line
        identifier: String,
        /// Why resolution failed (not found, ambiguous, ...)
        reason: String,
    },

    /// A remote API call failed.
    ///
    /// Treated as transient: operations wrapped in a
    /// [`RetryPolicy`](crate::core::retry::RetryPolicy) retry it.
    #[error("API error: {0}")]
    Api(String),

    /// Downloading one message's media failed.
    ///
    /// Never aborts a run; the media pipeline logs it and moves on.
    #[error("Failed to download media for message {message_id}: {reason}")]
    MediaDownload {
        /// Raw id of the message whose attachment failed
        message_id: u64,
        /// Underlying failure description
        reason: String,
    },

    /// The configuration contradicts itself or holds an invalid value.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Unknown IANA timezone name.
    #[error("Invalid timezone '{input}'. Expected an IANA name such as {expected}")]
    InvalidTimezone {
        /// The name that failed to parse
        input: String,
        /// Example of an accepted value
        expected: &'static str,
    },

    /// The renderer failed to produce a document.
    #[error("Render error: {0}")]
    Render(String),

    /// The output document could not be placed at the requested path.
    #[error("Failed to save export to {}: {source}", path.display())]
    Save {
        /// Requested output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl ExportError {
    /// Creates a chat resolution error.
    pub fn chat_resolution(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        ExportError::ChatResolution {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Creates a remote API error.
    pub fn api(message: impl Into<String>) -> Self {
        ExportError::Api(message.into())
    }

    /// Creates a media download error.
    pub fn media_download(message_id: u64, reason: impl Into<String>) -> Self {
        ExportError::MediaDownload {
            message_id,
            reason: reason.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ExportError::Validation(message.into())
    }

    /// Creates an invalid timezone error.
    pub fn invalid_timezone(input: impl Into<String>) -> Self {
        ExportError::InvalidTimezone {
            input: input.into(),
            expected: "Europe/Moscow, UTC, America/New_York",
        }
    }

    /// Creates a render error.
    pub fn render(message: impl Into<String>) -> Self {
        ExportError::Render(message.into())
    }

    /// Returns `true` if retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExportError::Api(_) | ExportError::Io(_) | ExportError::MediaDownload { .. }
        )
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, ExportError::Io(_))
    }

    /// Returns `true` if this is a chat resolution error.
    pub fn is_chat_resolution(&self) -> bool {
        matches!(self, ExportError::ChatResolution { .. })
    }

    /// Returns `true` if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExportError::Validation(_) | ExportError::InvalidTimezone { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = ExportError::from(io_err);
        let display = err.to_string();
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_chat_resolution_display() {
        let err = ExportError::chat_resolution("@nowhere", "chat not found");
        let display = err.to_string();
        assert!(display.contains("@nowhere"));
        assert!(display.contains("chat not found"));
        assert!(err.is_chat_resolution());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_media_download_display() {
        let err = ExportError::media_download(42, "connection reset");
        let display = err.to_string();
        assert!(display.contains("42"));
        assert!(display.contains("connection reset"));
    }

    #[test]
    fn test_invalid_timezone_display() {
        let err = ExportError::invalid_timezone("Mars/Olympus");
        assert!(err.to_string().contains("Mars/Olympus"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_save_error_source() {
        use std::error::Error;
        let err = ExportError::Save {
            path: PathBuf::from("/readonly/out.html"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/readonly/out.html"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ExportError::api("flood wait").is_transient());
        assert!(ExportError::from(io::Error::other("reset")).is_transient());
        assert!(!ExportError::validation("bad").is_transient());
        assert!(!ExportError::render("template").is_transient());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: ExportError = json_err.into();
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_error_debug() {
        let err = ExportError::validation("bad");
        let debug = format!("{:?}", err);
        assert!(debug.contains("Validation"));
    }
}
