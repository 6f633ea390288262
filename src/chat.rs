//! Chat flow: transcript, question submission, answers with citations, and
//! the document preview mode.
//!
//! A [`ChatSession`] is bound to at most one document for its whole life. It
//! lets one question be in flight at a time. [`ChatSession::submit`] appends
//! the user message and hands back a [`QuestionTicket`]; [`ChatSession::resolve`]
//! appends the answer (or a readable error) and re-enables input. The
//! transcript only grows.

use crate::api::{AnswerResponse, ApiClient};
use crate::config::ClientConfig;
use crate::document::DocumentSession;
use crate::error::{ClientError, SubmitRejection};
use crate::model::{ChunkMetadata, DocumentId, Message};
use crate::observer::SharedObserver;
use crate::route::ChatRoute;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether the session can accept a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// No identity was supplied. Submission is impossible.
    NoDocument,
    Ready,
    /// A question is in flight.
    Sending,
}

/// A submitted question awaiting its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionTicket {
    token: u64,
    doc_id: DocumentId,
    question: String,
}

impl QuestionTicket {
    pub fn doc_id(&self) -> &DocumentId {
        &self.doc_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }
}

#[derive(Debug, Clone)]
struct Pending {
    token: u64,
    question: String,
}

/// Why the preview pane shows chunk previews instead of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No document identity, so nothing to embed.
    NoReference,
    /// The embed was attempted and could not be rendered.
    EmbedFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewMode {
    /// Embed the artifact at this address.
    Embedded(Url),
    /// Show the cached chunk previews.
    Chunks(FallbackReason),
}

/// Everything the preview pane needs to draw itself.
#[derive(Debug, Clone)]
pub struct PreviewPane {
    pub mode: PreviewMode,
    /// Link to the artifact, offered in the chunk fallback as well.
    pub reference: Option<Url>,
    pub chunks: Arc<[ChunkMetadata]>,
}

/// Resolves the pending question as failed when an in-flight
/// [`ChatSession::ask`] is dropped before its answer arrives.
struct CancelGuard<'a> {
    pending: &'a mut Option<Pending>,
    transcript: &'a mut Vec<Message>,
    fallback: &'a str,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.pending.take().is_some() {
            warn!("Question cancelled before its answer arrived");
            self.transcript.push(Message::assistant(self.fallback));
        }
    }
}

pub struct ChatSession {
    doc_id: Option<DocumentId>,
    transcript: Vec<Message>,
    draft: String,
    pending: Option<Pending>,
    next_token: u64,
    preview: PreviewMode,
    reference: Option<Url>,

    answer_fallback: String,
    error_fallback: String,
    observer: Option<SharedObserver>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("doc_id", &self.doc_id)
            .field("messages", &self.transcript.len())
            .field("pending", &self.pending.as_ref().map(|p| &p.question))
            .field("preview", &self.preview)
            .finish()
    }
}

impl ChatSession {
    /// Open a chat view at `route`.
    ///
    /// The transcript starts with the configured greeting. Without an
    /// identity in the route the session stays in [`ChatState::NoDocument`]
    /// until [`bind`](Self::bind) supplies one.
    pub fn open(route: &ChatRoute, docs: &DocumentSession, config: &ClientConfig) -> Self {
        let mut session = Self {
            doc_id: None,
            transcript: vec![Message::assistant(config.greeting.clone())],
            draft: String::new(),
            pending: None,
            next_token: 0,
            preview: PreviewMode::Chunks(FallbackReason::NoReference),
            reference: None,
            answer_fallback: config.answer_fallback.clone(),
            error_fallback: config.chat_error_fallback.clone(),
            observer: config.observer.clone(),
        };
        match route.doc_id {
            Some(ref id) => {
                session.bind(id.clone(), docs);
            }
            None => warn!("Chat opened without a doc_id; questions are disabled"),
        }
        session
    }

    /// Supply the identity to a session opened without one.
    ///
    /// Returns `false` (and changes nothing) if an identity is already
    /// bound. A session never switches documents; open a new one instead.
    ///
    /// If `docs` is not already describing this document, its chunk list
    /// is fetched in the background.
    pub fn bind(&mut self, doc_id: DocumentId, docs: &DocumentSession) -> bool {
        if self.doc_id.is_some() {
            return false;
        }
        if docs.current().as_ref() != Some(&doc_id) {
            docs.bind(&doc_id);
            docs.prefetch(doc_id.clone());
        }
        let reference = docs.preview_reference(&doc_id);
        debug!("Chat bound to document {} ({})", doc_id, reference);
        self.preview = PreviewMode::Embedded(reference.clone());
        self.reference = Some(reference);
        self.doc_id = Some(doc_id);
        true
    }

    pub fn doc_id(&self) -> Option<&DocumentId> {
        self.doc_id.as_ref()
    }

    pub fn state(&self) -> ChatState {
        match (&self.doc_id, &self.pending) {
            (None, _) => ChatState::NoDocument,
            (Some(_), Some(_)) => ChatState::Sending,
            (Some(_), None) => ChatState::Ready,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// The question awaiting an answer, if any.
    pub fn pending_question(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.question.as_str())
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Whether submitting the current draft would be accepted.
    pub fn can_submit(&self) -> bool {
        self.state() == ChatState::Ready && !self.draft.trim().is_empty()
    }

    /// Submit `text` as a question.
    ///
    /// On acceptance the trimmed question is appended to the transcript, the
    /// draft is cleared and the session moves to [`ChatState::Sending`].
    pub fn submit(&mut self, text: &str) -> Result<QuestionTicket, SubmitRejection> {
        let doc_id = self.doc_id.clone().ok_or(SubmitRejection::NoDocument)?;
        if self.pending.is_some() {
            return Err(SubmitRejection::QuestionPending);
        }
        let question = text.trim();
        if question.is_empty() {
            return Err(SubmitRejection::EmptyQuestion);
        }

        self.next_token += 1;
        let token = self.next_token;
        self.transcript.push(Message::user(question));
        self.pending = Some(Pending {
            token,
            question: question.to_string(),
        });
        self.draft.clear();

        if let Some(ref obs) = self.observer {
            obs.on_question_sent(&doc_id, question);
        }
        debug!("Question #{} for document {}: {:?}", token, doc_id, question);

        Ok(QuestionTicket {
            token,
            doc_id,
            question: question.to_string(),
        })
    }

    /// Submit the current draft.
    pub fn submit_draft(&mut self) -> Result<QuestionTicket, SubmitRejection> {
        let draft = std::mem::take(&mut self.draft);
        let result = self.submit(&draft);
        if result.is_err() {
            self.draft = draft;
        }
        result
    }

    /// Apply the outcome of a question.
    ///
    /// A ticket that is not the pending one is ignored and `None` returned.
    /// Otherwise exactly one assistant message is appended and returned.
    pub fn resolve(
        &mut self,
        ticket: QuestionTicket,
        result: Result<AnswerResponse, ClientError>,
    ) -> Option<&Message> {
        match self.pending {
            Some(ref p) if p.token == ticket.token => {}
            _ => {
                debug!("Ignoring answer for stale question #{}", ticket.token);
                return None;
            }
        }
        Some(self.complete(ticket, result))
    }

    fn complete(
        &mut self,
        ticket: QuestionTicket,
        result: Result<AnswerResponse, ClientError>,
    ) -> &Message {
        self.pending = None;

        let message = match result {
            Ok(response) => {
                let citations = response.citations();
                let answer = response
                    .answer
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| self.answer_fallback.clone());
                let cited = citations.as_ref().map_or(0, Vec::len);
                info!("Answer for document {} ({} citations)", ticket.doc_id, cited);
                if let Some(ref obs) = self.observer {
                    obs.on_answer(&ticket.doc_id, cited);
                }
                Message::assistant(answer).with_citations(citations)
            }
            Err(e) => {
                warn!("Question for document {} failed: {}", ticket.doc_id, e);
                let text = e.user_message(&self.error_fallback);
                if let Some(ref obs) = self.observer {
                    obs.on_question_error(&ticket.doc_id, &text);
                }
                Message::assistant(text)
            }
        };

        self.transcript.push(message);
        &self.transcript[self.transcript.len() - 1]
    }

    /// Submit `text`, wait for the service and append its answer.
    ///
    /// Dropping the returned future mid-request counts as a failed question:
    /// the error fallback is appended and input is re-enabled.
    pub async fn ask(&mut self, api: &ApiClient, text: &str) -> Result<&Message, SubmitRejection> {
        let ticket = self.submit(text)?;
        let mut guard = CancelGuard {
            pending: &mut self.pending,
            transcript: &mut self.transcript,
            fallback: &self.error_fallback,
            armed: true,
        };
        let result = api.ask(&ticket.doc_id, &ticket.question).await;
        guard.armed = false;
        drop(guard);

        // `&mut self` was held across the request, so the ticket is still pending.
        Ok(self.complete(ticket, result))
    }

    pub fn preview_mode(&self) -> &PreviewMode {
        &self.preview
    }

    /// Record that the embedded document could not be rendered.
    ///
    /// The session switches to chunk previews for the rest of its life; there
    /// is no retry.
    pub fn report_embed_failure(&mut self) {
        if let PreviewMode::Embedded(ref url) = self.preview {
            warn!("Embedding {} failed; showing chunk previews", url);
            self.preview = PreviewMode::Chunks(FallbackReason::EmbedFailed);
        }
    }

    /// Probe the artifact and fall back to chunk previews if it cannot be
    /// embedded. Returns the resulting mode.
    pub async fn check_embed(&mut self, docs: &DocumentSession) -> &PreviewMode {
        let id = match (&self.preview, &self.doc_id) {
            (PreviewMode::Embedded(_), Some(id)) => id.clone(),
            _ => return &self.preview,
        };
        if !docs.can_embed(&id).await {
            self.report_embed_failure();
        }
        &self.preview
    }

    /// Snapshot of the preview pane.
    pub fn preview(&self, docs: &DocumentSession) -> PreviewPane {
        let chunks = match (&self.doc_id, docs.current()) {
            (Some(mine), Some(ref cached)) if mine == cached => docs.chunks(),
            _ => Arc::default(),
        };
        PreviewPane {
            mode: self.preview.clone(),
            reference: self.reference.clone(),
            chunks,
        }
    }
}
