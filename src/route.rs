//! Navigation address of a chat view: `/chat?doc_id=<id>`.
//!
//! The hand-off from the upload flow to the chat flow is nothing more than a
//! [`ChatRoute`] carrying the document identity. Parsing is tolerant: a
//! missing, empty or unparsable address yields a route with no identity,
//! which leaves the chat session permanently unable to submit.

use crate::model::DocumentId;
use reqwest::Url;
use std::fmt;

/// Path of the chat view.
pub const CHAT_PATH: &str = "/chat";

const DOC_ID_PARAM: &str = "doc_id";

/// The addressable state of a chat view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatRoute {
    pub doc_id: Option<DocumentId>,
}

impl ChatRoute {
    pub fn for_document(doc_id: DocumentId) -> Self {
        Self {
            doc_id: Some(doc_id),
        }
    }

    /// Parse a view address: a path with query (`/chat?doc_id=42`) or a full
    /// URL. Only the `doc_id` query parameter is read.
    pub fn parse(address: &str) -> Self {
        // Relative addresses are resolved against a dummy origin.
        let url = Url::parse(address)
            .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(address)));

        let doc_id = url.ok().and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == DOC_ID_PARAM)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| DocumentId::from_param(&v))
        });

        Self { doc_id }
    }

    /// The address of this route, e.g. `/chat?doc_id=42`.
    pub fn to_path(&self) -> String {
        match self.doc_id {
            Some(ref id) => {
                let query = Url::parse_with_params(
                    "http://localhost/",
                    &[(DOC_ID_PARAM, id.to_string())],
                )
                .ok()
                .and_then(|u| u.query().map(str::to_string))
                .unwrap_or_default();
                format!("{CHAT_PATH}?{query}")
            }
            None => CHAT_PATH.to_string(),
        }
    }
}

impl fmt::Display for ChatRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// The result of a successful `continue`: the identity and where to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandOff {
    pub doc_id: DocumentId,
    pub chunk_count: usize,
    /// `true` when no upload request was needed.
    pub reused: bool,
}

impl HandOff {
    pub fn route(&self) -> ChatRoute {
        ChatRoute::for_document(self.doc_id.clone())
    }
}
