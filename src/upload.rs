//! Upload flow: file selection, optional naming, ingestion, and the
//! idempotent hand-off to chat.
//!
//! ## State machine
//!
//! ```text
//!            select_file (different file) ──▶ Idle
//! Idle ─┐
//! Failed├─ begin_upload ──▶ Uploading ─┬─ finish_upload(ok)  ──▶ Uploaded(doc_id, n)
//! Uploaded┘                            ├─ finish_upload(err) ──▶ Failed(reason)
//!                                      └─ cancel / drop      ──▶ Failed(fallback)
//! ```
//!
//! ## Split-phase API
//!
//! [`UploadController::upload`] is `begin_upload` → request → `finish_upload`.
//! The two halves are public so a host event loop can release its borrow of
//! the controller while the request is in flight. The ticket ties a result
//! to the selection it was made for: a result for a file that has since been
//! replaced is discarded instead of being shown as success for the new file.
//! A ticket that will never be finished must be handed back through
//! [`UploadController::cancel_upload`], otherwise the controller stays in
//! `Uploading`.

use crate::api::{ApiClient, UploadResponse};
use crate::config::ClientConfig;
use crate::document::DocumentSession;
use crate::error::{ClientError, UploadError};
use crate::input::StagedFile;
use crate::model::DocumentId;
use crate::observer::SharedObserver;
use crate::route::HandOff;
use tracing::{debug, info, warn};

/// Where the controller is in the upload flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    Uploaded {
        doc_id: DocumentId,
        chunk_count: usize,
    },
    Failed {
        reason: String,
    },
}

impl UploadState {
    pub fn doc_id(&self) -> Option<&DocumentId> {
        match self {
            UploadState::Uploaded { doc_id, .. } => Some(doc_id),
            _ => None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self, UploadState::Uploading)
    }
}

/// An upload that has been started but not yet resolved.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    selection: u64,
    file: StagedFile,
    doc_name: Option<String>,
}

impl UploadTicket {
    pub fn file(&self) -> &StagedFile {
        &self.file
    }

    pub fn doc_name(&self) -> Option<&str> {
        self.doc_name.as_deref()
    }
}

/// Fails the in-flight upload when an [`UploadController::upload`] future is
/// dropped before the service answers.
struct CancelGuard<'a> {
    state: &'a mut UploadState,
    observer: Option<&'a SharedObserver>,
    fallback: &'a str,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.state.is_uploading() {
            warn!("Upload cancelled before the service answered");
            *self.state = UploadState::Failed {
                reason: self.fallback.to_string(),
            };
            if let Some(obs) = self.observer {
                obs.on_upload_error(self.fallback);
            }
        }
    }
}

/// Owns the staged file, the optional document name and the [`UploadState`].
pub struct UploadController {
    api: ApiClient,
    observer: Option<SharedObserver>,
    error_fallback: String,
    prefetch: Option<DocumentSession>,

    staged: Option<StagedFile>,
    /// Bumped whenever the staged file changes.
    selection: u64,
    name: Option<String>,
    state: UploadState,
}

impl std::fmt::Debug for UploadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadController")
            .field("staged", &self.staged)
            .field("selection", &self.selection)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("prefetch", &self.prefetch.is_some())
            .finish()
    }
}

impl UploadController {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self {
            api,
            observer: config.observer.clone(),
            error_fallback: config.upload_error_fallback.clone(),
            prefetch: None,
            staged: None,
            selection: 0,
            name: None,
            state: UploadState::Idle,
        }
    }

    /// Prefetch chunk previews into `docs` after every successful upload.
    pub fn with_prefetch(mut self, docs: DocumentSession) -> Self {
        self.prefetch = Some(docs);
        self
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.staged.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Stage `file`, replacing any previous selection.
    ///
    /// Selecting a different file resets the state to `Idle`, so a document
    /// identity uploaded for the old file is never reused for the new one.
    /// Re-selecting an identical file (same name and bytes) changes nothing.
    pub fn select_file(&mut self, file: StagedFile) {
        if self.staged.as_ref() == Some(&file) {
            debug!("Re-selected '{}'; keeping upload state", file.file_name());
            return;
        }
        debug!("Staged '{}' ({} bytes)", file.file_name(), file.len());
        self.staged = Some(file);
        self.invalidate();
    }

    /// Drop the staged file.
    pub fn clear_selection(&mut self) {
        if self.staged.take().is_some() {
            self.invalidate();
        }
    }

    fn invalidate(&mut self) {
        self.selection += 1;
        if self.state != UploadState::Idle {
            debug!("Selection changed; discarding {:?}", self.state);
            self.state = UploadState::Idle;
        }
    }

    /// Set the optional document label.
    ///
    /// Control characters are removed. A label that is blank afterwards is
    /// stored as absent, so the form field is omitted rather than sent empty.
    pub fn set_name(&mut self, name: impl AsRef<str>) {
        let cleaned: String = name.as_ref().chars().filter(|c| !c.is_control()).collect();
        let trimmed = cleaned.trim();
        self.name = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    /// First half of [`upload`](Self::upload): validate and move to `Uploading`.
    pub fn begin_upload(&mut self) -> Result<UploadTicket, UploadError> {
        if self.state.is_uploading() {
            return Err(UploadError::InProgress);
        }
        let file = self.staged.clone().ok_or(UploadError::NoFileSelected)?;

        self.state = UploadState::Uploading;
        if let Some(ref obs) = self.observer {
            obs.on_upload_start(file.file_name(), file.len());
        }

        Ok(UploadTicket {
            selection: self.selection,
            file,
            doc_name: self.name.clone(),
        })
    }

    /// Second half of [`upload`](Self::upload): apply the service's answer.
    pub fn finish_upload(
        &mut self,
        ticket: UploadTicket,
        result: Result<UploadResponse, ClientError>,
    ) -> Result<HandOff, UploadError> {
        if ticket.selection != self.selection {
            debug!(
                "Discarding upload result for superseded selection '{}'",
                ticket.file.file_name()
            );
            return Err(UploadError::Superseded);
        }

        match result {
            Ok(response) => {
                let doc_id = response.doc_id.clone();
                let chunk_count = response.chunk_count();
                info!(
                    "Uploaded '{}' as document {} ({} chunks)",
                    ticket.file.file_name(),
                    doc_id,
                    chunk_count
                );

                self.state = UploadState::Uploaded {
                    doc_id: doc_id.clone(),
                    chunk_count,
                };
                if let Some(ref obs) = self.observer {
                    obs.on_upload_complete(&doc_id, chunk_count);
                }
                if let Some(ref docs) = self.prefetch {
                    docs.prefetch(doc_id.clone());
                }

                Ok(HandOff {
                    doc_id,
                    chunk_count,
                    reused: false,
                })
            }
            Err(e) => {
                let reason = e.user_message(&self.error_fallback);
                warn!("Upload of '{}' failed: {}", ticket.file.file_name(), e);

                self.state = UploadState::Failed {
                    reason: reason.clone(),
                };
                if let Some(ref obs) = self.observer {
                    obs.on_upload_error(&reason);
                }
                Err(UploadError::Failed(reason))
            }
        }
    }

    /// Abandon a started upload without a result.
    ///
    /// The attempt counts as failed with the upload fallback text, so the
    /// user can retry. A ticket for a superseded selection changes nothing.
    pub fn cancel_upload(&mut self, ticket: UploadTicket) {
        if ticket.selection != self.selection || !self.state.is_uploading() {
            return;
        }
        warn!("Upload of '{}' cancelled", ticket.file.file_name());
        self.state = UploadState::Failed {
            reason: self.error_fallback.clone(),
        };
        if let Some(ref obs) = self.observer {
            obs.on_upload_error(&self.error_fallback);
        }
    }

    /// Upload the staged file.
    ///
    /// Every call issues a request (re-uploading after success is allowed);
    /// use [`continue_to_chat`](Self::continue_to_chat) for the idempotent
    /// path. Dropping the returned future mid-request leaves the controller
    /// in `Failed`, ready for a retry.
    pub async fn upload(&mut self) -> Result<HandOff, UploadError> {
        let ticket = self.begin_upload()?;
        let mut guard = CancelGuard {
            state: &mut self.state,
            observer: self.observer.as_ref(),
            fallback: &self.error_fallback,
            armed: true,
        };
        let result = self.api.upload(&ticket.file, ticket.doc_name()).await;
        guard.armed = false;
        drop(guard);

        self.finish_upload(ticket, result)
    }

    /// Hand the document off to chat, uploading first only if needed.
    ///
    /// With an identity already uploaded for the staged file this performs
    /// no network I/O. While an upload is in flight it is rejected rather
    /// than queued.
    pub async fn continue_to_chat(&mut self) -> Result<HandOff, UploadError> {
        match self.state {
            UploadState::Uploaded {
                ref doc_id,
                chunk_count,
            } => {
                debug!("Document {} already uploaded; skipping upload", doc_id);
                Ok(HandOff {
                    doc_id: doc_id.clone(),
                    chunk_count,
                    reused: true,
                })
            }
            UploadState::Uploading => Err(UploadError::InProgress),
            UploadState::Idle | UploadState::Failed { .. } => self.upload().await,
        }
    }
}
