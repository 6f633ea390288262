//! HTTP boundary to the ingestion / question-answer service.
//!
//! ## Endpoints
//!
//! ```text
//! POST /upload                    multipart file (+ doc_name)  ──▶ UploadResponse
//! GET  /upload/{doc_id}           raw PDF (preview reference)
//! GET  /upload/{doc_id}/chunks    ──▶ [ChunkMetadata]
//! POST /query                     {doc_id, question}           ──▶ AnswerResponse
//! GET  /                          ──▶ HealthStatus
//! ```
//!
//! 1. [`client`] — [`ApiClient`]: one method per endpoint, uniform error
//!    mapping (transport → [`crate::ClientError::Transport`], non-2xx →
//!    [`crate::ClientError::Service`] with the parsed `error` / `message`)
//! 2. [`wire`]   — request and response bodies exactly as they cross the
//!    network, including the heterogeneous `chunks` field

pub mod client;
pub mod wire;

pub use client::ApiClient;
pub use wire::{AnswerResponse, ChunksField, HealthStatus, QuestionRequest, UploadResponse};
