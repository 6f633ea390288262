//! Observer trait for upload and chat events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::ClientConfigBuilder::observer`] to receive events as the
//! controllers talk to the service.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: a terminal front-end
//! can drive a spinner, a GUI can forward events to its own message loop, and
//! the library never needs to know which. The trait is `Send + Sync` because
//! the background chunk prefetch reports from a spawned task.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfchat::{ClientConfig, DocumentId, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     answers: AtomicUsize,
//! }
//!
//! impl SessionObserver for CountingObserver {
//!     fn on_answer(&self, _doc_id: &DocumentId, citation_count: usize) {
//!         self.answers.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("answer with {citation_count} citations");
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { answers: AtomicUsize::new(0) });
//!
//! let config = ClientConfig::builder()
//!     .observer(observer as Arc<dyn SessionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::model::DocumentId;
use std::sync::Arc;

/// Called by the controllers as requests start and resolve.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about.
pub trait SessionObserver: Send + Sync {
    /// Called just before the upload request is sent.
    ///
    /// # Arguments
    /// * `file_name` — name of the staged file
    /// * `size`      — byte length of the staged file
    fn on_upload_start(&self, file_name: &str, size: usize) {
        let _ = (file_name, size);
    }

    /// Called when the service accepted the upload.
    fn on_upload_complete(&self, doc_id: &DocumentId, chunk_count: usize) {
        let _ = (doc_id, chunk_count);
    }

    /// Called when the upload failed.
    ///
    /// # Arguments
    /// * `reason` — the extracted, user-facing text
    fn on_upload_error(&self, reason: &str) {
        let _ = reason;
    }

    /// Called when a chunk listing resolved (an empty list on failure).
    fn on_chunks_loaded(&self, doc_id: &DocumentId, count: usize) {
        let _ = (doc_id, count);
    }

    /// Called just before a question is sent.
    fn on_question_sent(&self, doc_id: &DocumentId, question: &str) {
        let _ = (doc_id, question);
    }

    /// Called when an answer was appended to the transcript.
    fn on_answer(&self, doc_id: &DocumentId, citation_count: usize) {
        let _ = (doc_id, citation_count);
    }

    /// Called when a question failed and an error message was appended.
    fn on_question_error(&self, doc_id: &DocumentId, message: &str) {
        let _ = (doc_id, message);
    }
}

/// A no-op observer for callers that don't need events.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type SharedObserver = Arc<dyn SessionObserver>;
