//! Client configuration.
//!
//! Everything the controllers need to know about the remote service and the
//! user-facing fallback texts lives in [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. One struct means one place to look when two runs
//! talk to different backends or show different wording.

use crate::error::ClientError;
use crate::observer::SharedObserver;
use reqwest::Url;
use std::fmt;

/// Default backend address of the ingestion / question-answer service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Assistant message every chat transcript starts with.
pub const DEFAULT_GREETING: &str = "Hi! Ask me anything about your PDF. I'll answer using only \
the uploaded content and include citations.";

/// Shown when the service answers without an `answer` field.
pub const DEFAULT_ANSWER_FALLBACK: &str = "No answer returned.";

/// Shown when a question fails and the service gave no reason.
pub const DEFAULT_CHAT_ERROR_FALLBACK: &str = "Sorry, something went wrong while answering.";

/// Shown when an upload fails and the service gave no reason.
pub const DEFAULT_UPLOAD_ERROR_FALLBACK: &str = "Upload failed. Check the logs for details.";

/// Configuration for an [`crate::api::ApiClient`] and the sessions built on it.
///
/// # Example
/// ```rust
/// use edgequake_pdfchat::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:5000")
///     .request_timeout_secs(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url.as_str(), "http://localhost:5000/");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Root of the remote service. Default: `http://localhost:5000`.
    pub base_url: Url,

    /// Timeout for chunk listing and question requests, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for the upload request, in seconds. Default: 300.
    ///
    /// Ingestion (text extraction, chunking, embedding) happens before the
    /// service responds, so this is much longer than the request timeout.
    pub upload_timeout_secs: u64,

    /// Timeout for staging a PDF from an HTTP(S) URL, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// First assistant message of every chat transcript.
    pub greeting: String,

    /// Assistant text used when a response carries no `answer`.
    pub answer_fallback: String,

    /// Assistant text used when a question fails without a service reason.
    pub chat_error_fallback: String,

    /// Status text used when an upload fails without a service reason.
    pub upload_error_fallback: String,

    /// Optional observer notified of upload and chat events.
    pub observer: Option<SharedObserver>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: 30,
            upload_timeout_secs: 300,
            download_timeout_secs: 120,
            greeting: DEFAULT_GREETING.to_string(),
            answer_fallback: DEFAULT_ANSWER_FALLBACK.to_string(),
            chat_error_fallback: DEFAULT_CHAT_ERROR_FALLBACK.to_string(),
            upload_error_fallback: DEFAULT_UPLOAD_ERROR_FALLBACK.to_string(),
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("greeting", &self.greeting)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
            base_url: None,
        }
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL is a valid URL")
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    base_url: Option<String>,
}

impl ClientConfigBuilder {
    /// Backend root. Validated in [`build`](Self::build).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn greeting(mut self, text: impl Into<String>) -> Self {
        self.config.greeting = text.into();
        self
    }

    pub fn answer_fallback(mut self, text: impl Into<String>) -> Self {
        self.config.answer_fallback = text.into();
        self
    }

    pub fn chat_error_fallback(mut self, text: impl Into<String>) -> Self {
        self.config.chat_error_fallback = text.into();
        self
    }

    pub fn upload_error_fallback(mut self, text: impl Into<String>) -> Self {
        self.config.upload_error_fallback = text.into();
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ClientConfig, ClientError> {
        if let Some(raw) = self.base_url.take() {
            self.config.base_url = parse_base_url(&raw)?;
        }

        let c = &self.config;
        if c.request_timeout_secs == 0 || c.upload_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.answer_fallback.trim().is_empty()
            || c.chat_error_fallback.trim().is_empty()
            || c.upload_error_fallback.trim().is_empty()
        {
            return Err(ClientError::InvalidConfig(
                "Fallback texts must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Parse and normalise a backend root: HTTP(S) only, always ending in `/`
/// so that relative joins keep any path prefix (`http://host/api/`).
fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash)
        .map_err(|e| ClientError::InvalidConfig(format!("Invalid base URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidConfig(format!(
            "Base URL must be http or https, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.base_url.as_str(), "http://localhost:5000/");
        assert_eq!(c.request_timeout_secs, 30);
        assert_eq!(c.answer_fallback, "No answer returned.");
        assert!(c.observer.is_none());
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let c = ClientConfig::builder()
            .base_url("https://notes.example.com/api")
            .build()
            .unwrap();
        assert_eq!(c.base_url.as_str(), "https://notes.example.com/api/");
        assert_eq!(
            c.base_url.join("upload").unwrap().as_str(),
            "https://notes.example.com/api/upload"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::builder()
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(ClientConfig::builder().base_url("not a url").build().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(ClientConfig::builder().request_timeout_secs(0).build().is_err());
    }

    #[test]
    fn rejects_blank_fallback() {
        assert!(ClientConfig::builder().answer_fallback("  ").build().is_err());
    }

    #[test]
    fn debug_hides_observer() {
        let c = ClientConfig::builder()
            .observer(std::sync::Arc::new(crate::observer::NoopObserver))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn SessionObserver>"), "got: {dbg}");
    }
}
