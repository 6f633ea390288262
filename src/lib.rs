//! # edgequake-pdfchat
//!
//! Client-side workflow for "upload a PDF, then chat with it" against a
//! retrieval-augmented ingestion / question-answer service.
//!
//! ## Why this crate?
//!
//! The service does the hard parts (text extraction, chunking, embedding,
//! retrieval, answer generation). What is left on the client is easy to get
//! subtly wrong: uploading the same file twice because the user pressed
//! "continue" after "upload", showing a stale chunk list after switching
//! documents, letting two questions race, or rendering citations whose shape
//! depends on the backend version. This crate owns those rules.
//!
//! ## Flow Overview
//!
//! ```text
//! PDF (path / URL / bytes)
//!  │
//!  ├─ 1. Stage     StagedFile: validate %PDF magic, keep name + bytes
//!  ├─ 2. Upload    UploadController: POST /upload, at most once per selection
//!  ├─ 3. Hand-off  ChatRoute `/chat?doc_id=<id>`
//!  ├─ 4. Chunks    DocumentSession: GET /upload/{id}/chunks (prefetched)
//!  ├─ 5. Chat      ChatSession: POST /query, one question in flight
//!  └─ 6. Preview   embed /upload/{id}, or fall back to chunk previews
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfchat::{
//!     ApiClient, ChatSession, ClientConfig, DocumentSession, StagedFile, UploadController,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().base_url("http://localhost:5000").build()?;
//!     let api = ApiClient::new(&config)?;
//!     let docs = DocumentSession::new(api.clone(), &config);
//!
//!     let mut upload = UploadController::new(api.clone(), &config).with_prefetch(docs.clone());
//!     upload.select_file(StagedFile::from_path("notes.pdf").await?);
//!     let hand_off = upload.continue_to_chat().await?;
//!
//!     let mut chat = ChatSession::open(&hand_off.route(), &docs, &config);
//!     let reply = chat.ask(&api, "What is the deadline?").await?;
//!     println!("{}", edgequake_pdfchat::render::message(reply));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdfchat = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod chat;
pub mod config;
pub mod document;
pub mod error;
pub mod input;
pub mod model;
pub mod observer;
pub mod render;
pub mod route;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{AnswerResponse, ApiClient, HealthStatus, UploadResponse};
pub use chat::{ChatSession, ChatState, FallbackReason, PreviewMode, PreviewPane, QuestionTicket};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use document::DocumentSession;
pub use error::{ClientError, ErrorBody, SubmitRejection, UploadError};
pub use input::StagedFile;
pub use model::{ChunkId, ChunkMetadata, Citation, DocumentId, Identifier, Message, Role};
pub use observer::{NoopObserver, SessionObserver, SharedObserver};
pub use route::{ChatRoute, HandOff};
pub use upload::{UploadController, UploadState, UploadTicket};
