//! Input staging: turn a user-supplied path, URL or byte buffer into a
//! [`StagedFile`] ready for upload.
//!
//! ## Why validate locally?
//!
//! The ingestion service rejects non-PDF input, but only after the whole file
//! has crossed the network. Checking existence, permissions, emptiness and the
//! `%PDF` magic bytes up front turns those into immediate, precise errors that
//! never reach the service.

use crate::error::ClientError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF held in memory, waiting to be uploaded.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedFile {
    file_name: String,
    bytes: Arc<[u8]>,
}

impl fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedFile")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl StagedFile {
    /// Stage in-memory bytes under `file_name`.
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self, ClientError> {
        let file_name = file_name.into();
        let bytes: Vec<u8> = bytes.into();
        validate_pdf(&file_name, &bytes)?;
        Ok(Self {
            file_name,
            bytes: bytes.into(),
        })
    }

    /// Stage a local file, validating existence, read permission and PDF
    /// magic bytes.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ClientError::PermissionDenied { path });
            }
            Err(_) => return Err(ClientError::FileNotFound { path }),
        };

        let file_name = file_name_of(&path);
        debug!("Staged local PDF: {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(file_name, bytes)
    }

    /// Download an HTTP(S) URL into memory and stage it.
    pub async fn from_url(url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        info!("Downloading PDF from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                ClientError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(ClientError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Self::from_bytes(extract_filename(url), bytes.to_vec())
    }

    /// Stage either a local path or an HTTP(S) URL.
    pub async fn resolve(input: &str, download_timeout_secs: u64) -> Result<Self, ClientError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ClientError::InvalidInput {
                input: input.to_string(),
            });
        }
        if is_url(trimmed) {
            Self::from_url(trimmed, download_timeout_secs).await
        } else {
            Self::from_path(PathBuf::from(trimmed)).await
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn validate_pdf(file_name: &str, bytes: &[u8]) -> Result<(), ClientError> {
    if bytes.is_empty() {
        return Err(ClientError::EmptyFile {
            name: file_name.to_string(),
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ClientError::NotAPdf {
            name: file_name.to_string(),
            magic,
        });
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
