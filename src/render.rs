//! Plain-text rendering of controller state: status lines, transcript
//! messages with citations, and the preview pane.
//!
//! Nothing here touches the network or mutates state. Hosts that draw their
//! own widgets can ignore this module; the CLI prints these strings as-is.

use crate::chat::{ChatState, FallbackReason, PreviewMode, PreviewPane};
use crate::model::{Citation, Message, Role};
use crate::upload::UploadState;
use std::fmt::Write;

/// Preview excerpts longer than this are cut with an ellipsis.
pub const PREVIEW_CLAMP_CHARS: usize = 160;

pub const UPLOADING_STATUS: &str = "Uploading…";
pub const NO_CHUNKS: &str = "No chunks available.";
pub const MISSING_DOCUMENT_NOTICE: &str =
    "Missing doc_id in the address. Return to the upload step and continue again.";

/// The upload status line, or `None` before anything happened.
pub fn upload_status(state: &UploadState) -> Option<String> {
    match state {
        UploadState::Idle => None,
        UploadState::Uploading => Some(UPLOADING_STATUS.to_string()),
        UploadState::Uploaded { doc_id, .. } => Some(format!("Upload successful! Doc ID: {doc_id}")),
        UploadState::Failed { reason } => Some(reason.clone()),
    }
}

/// Label of the send control.
pub fn send_label(state: ChatState) -> &'static str {
    match state {
        ChatState::Sending => "Thinking…",
        ChatState::Ready | ChatState::NoDocument => "Send",
    }
}

/// One citation: `Chunk #9 · Page 2`, then the excerpt on its own line.
///
/// The page and excerpt appear only when the citation carries them.
pub fn citation(c: &Citation) -> String {
    let mut out = format!("Chunk #{}", c.chunk_id);
    if let Some(page) = c.page {
        let _ = write!(out, " · Page {page}");
    }
    if let Some(ref preview) = c.preview {
        let _ = write!(out, "\n  {}", clamp(preview, PREVIEW_CLAMP_CHARS));
    }
    out
}

/// One transcript entry, with its citation block when non-empty.
pub fn message(m: &Message) -> String {
    let speaker = match m.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    let mut out = format!("{speaker}: {}", m.content);

    let citations = m.citations();
    if !citations.is_empty() {
        out.push_str("\n  Citations");
        for c in citations {
            for line in citation(c).lines() {
                let _ = write!(out, "\n    {line}");
            }
        }
    }
    out
}

/// The preview pane: either the artifact address or the chunk list with a
/// notice explaining why.
pub fn preview_pane(pane: &PreviewPane) -> String {
    let mut out = String::from("Document Preview");
    if let Some(ref url) = pane.reference {
        let _ = write!(out, "\nOpen original: {url}");
    }

    match pane.mode {
        PreviewMode::Embedded(ref url) => {
            let _ = write!(out, "\nEmbedded: {url}");
        }
        PreviewMode::Chunks(reason) => {
            let notice = match reason {
                FallbackReason::NoReference => "No PDF URL found. Showing chunk previews:",
                FallbackReason::EmbedFailed => {
                    "Preview unavailable. Showing chunk previews instead:"
                }
            };
            let _ = write!(out, "\n{notice}");

            if pane.chunks.is_empty() {
                let _ = write!(out, "\n  {NO_CHUNKS}");
            }
            for c in pane.chunks.iter() {
                let _ = write!(
                    out,
                    "\n  Page {} #{}\n    {}",
                    c.page,
                    c.chunk_id,
                    clamp(&c.preview, PREVIEW_CLAMP_CHARS)
                );
            }
        }
    }
    out
}

/// Cut `text` to at most `max` characters, collapsing internal whitespace.
fn clamp(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}
