//! Error types for the edgequake-pdfchat library.
//!
//! Three layers reflect three distinct failure modes:
//!
//! * [`ClientError`] — a single request or input could not be completed
//!   (file missing, not a PDF, transport failure, non-success HTTP status).
//!   Returned as `Err(ClientError)` from [`crate::api::ApiClient`] and
//!   [`crate::input::StagedFile`].
//!
//! * [`UploadError`] — why an upload / continue attempt did not produce a
//!   document identity. Input problems are caught before any request is sent.
//!
//! * [`SubmitRejection`] — why a question was not accepted by a
//!   [`crate::chat::ChatSession`]. A rejection never touches the transcript.
//!
//! None of these are fatal to a session: every controller stays interactive
//! after any of them.

use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from a single client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The staged file has no content.
    #[error("File '{name}' is empty")]
    EmptyFile { name: String },

    /// The file was read, but is not a PDF.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Service errors ────────────────────────────────────────────────────
    /// The request never produced an HTTP response (connect, timeout, TLS).
    #[error("Request to '{endpoint}' failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    ///
    /// `body` holds whatever `error` / `message` fields could be parsed from
    /// the response; both may be absent.
    #[error("Service returned HTTP {status}{}", .body.describe())]
    Service { status: StatusCode, body: ErrorBody },

    /// The service answered 2xx but the body did not have the expected shape.
    #[error("Unexpected response from '{endpoint}': {detail}")]
    Decode { endpoint: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Human-readable text for display in a status line or transcript.
    ///
    /// Precedence is the service's `error` field, then its `message` field,
    /// then `fallback`. Errors that never reached the service (transport,
    /// decode) always yield `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Service { body, .. } => body
                .extract()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
            _ => fallback.to_string(),
        }
    }

    /// `true` for problems caught locally before any request was sent.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ClientError::FileNotFound { .. }
                | ClientError::PermissionDenied { .. }
                | ClientError::InvalidInput { .. }
                | ClientError::EmptyFile { .. }
                | ClientError::NotAPdf { .. }
        )
    }
}

/// The optional JSON body of a non-success response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default, deserialize_with = "non_empty_string")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Parse a raw response body. Anything that is not a JSON object yields
    /// an empty body rather than an error.
    pub fn parse(raw: &[u8]) -> Self {
        serde_json::from_slice(raw).unwrap_or_default()
    }

    /// `error`, then `message`.
    pub fn extract(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }

    fn describe(&self) -> String {
        self.extract().map(|m| format!(": {m}")).unwrap_or_default()
    }
}

/// Accept only non-blank JSON strings; any other JSON value reads as absent.
fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// Why an upload or continue attempt did not yield a document identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// No file is staged.
    #[error("Please select a PDF.")]
    NoFileSelected,

    /// An upload for this controller is already in flight.
    #[error("An upload is already in progress.")]
    InProgress,

    /// The upload was rejected or never reached the service.
    /// Carries the extracted, user-facing reason.
    #[error("{0}")]
    Failed(String),

    /// The selection changed while the request was in flight; the result
    /// was discarded.
    #[error("The selected file changed during upload; result discarded.")]
    Superseded,
}

/// Why a [`crate::chat::ChatSession`] refused a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    /// The question trims to nothing.
    #[error("question is empty")]
    EmptyQuestion,

    /// Another question is still waiting for its answer.
    #[error("a question is already pending")]
    QuestionPending,

    /// No document identity is bound to the session.
    #[error("no document is bound to this session")]
    NoDocument,
}
