//! Request and response bodies as they cross the network.

use crate::model::{normalize_citations, Citation, DocumentId};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    pub doc_id: DocumentId,
    #[serde(default)]
    pub chunks: Option<ChunksField>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadResponse {
    /// Number of chunks the service created, whichever shape it reported.
    pub fn chunk_count(&self) -> usize {
        self.chunks.as_ref().map_or(0, ChunksField::count)
    }
}

/// The `chunks` field of an upload response: an inline array or a count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChunksField {
    Count(u64),
    List(Vec<serde_json::Value>),
    /// Anything else; counted as zero.
    Other(serde_json::Value),
}

impl ChunksField {
    pub fn count(&self) -> usize {
        match self {
            ChunksField::Count(n) => usize::try_from(*n).unwrap_or(usize::MAX),
            ChunksField::List(items) => items.len(),
            ChunksField::Other(v) => {
                warn!("Unexpected `chunks` value in upload response: {}", v);
                0
            }
        }
    }
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRequest<'a> {
    pub doc_id: &'a DocumentId,
    pub question: &'a str,
}

/// Body of a successful `POST /query`.
///
/// `citations` stays raw here; [`AnswerResponse::citations`] is the single
/// place it is normalized.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AnswerResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub citations: Option<serde_json::Value>,
}

impl AnswerResponse {
    /// Canonical citations; `None` when the service sent no array.
    pub fn citations(&self) -> Option<Vec<Citation>> {
        normalize_citations(self.citations.as_ref())
    }
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
