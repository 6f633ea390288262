//! Data model shared by the controllers: identities, chunks, messages and
//! citations.
//!
//! ## Citation normalization
//!
//! The question endpoint returns citations in two shapes: a bare chunk
//! identifier (`5`) or an object (`{"chunk_id": 9, "page": 2}`). Both are
//! read into the wire union [`CitationSource`] and immediately converted to
//! the canonical [`Citation`] by [`normalize_citations`], so nothing past the
//! response boundary ever sees the raw shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

// ── Identifiers ──────────────────────────────────────────────────────────

/// A service-issued identifier: a JSON number or a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(u64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{n}"),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

impl Identifier {
    /// Canonical digits become a numeric identifier, anything else stays
    /// text. `"0042"` and `"+5"` are text, so they survive a round trip
    /// through an address unchanged.
    pub fn from_param(s: &str) -> Self {
        match s.parse::<u64>() {
            Ok(n) if n.to_string() == s => Identifier::Number(n),
            _ => Identifier::Text(s.to_string()),
        }
    }
}

impl FromStr for Identifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Identifier::from_param(s))
    }
}

macro_rules! identifier_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Identifier);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl $name {
            /// Parse an address parameter; see [`Identifier::from_param`].
            pub fn from_param(s: &str) -> Self {
                $name(Identifier::from_param(s))
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::from_param(s))
            }
        }

        impl From<u64> for $name {
            fn from(n: u64) -> Self {
                $name(Identifier::Number(n))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(Identifier::Text(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(Identifier::Text(s))
            }
        }
    };
}

identifier_newtype!(
    /// Opaque identity of one uploaded document. Issued by the ingestion
    /// service, never mutated by the client.
    DocumentId
);

identifier_newtype!(
    /// Identifier of one chunk, unique within its document.
    ChunkId
);

// ── Chunks ───────────────────────────────────────────────────────────────

/// One service-defined excerpt of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: ChunkId,
    /// 1-indexed page the chunk starts on.
    pub page: u32,
    /// Short text excerpt. Missing or null reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub preview: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a chunk listing element by element.
///
/// Elements without a chunk id or a positive page are dropped with a
/// warning; the rest keep service order.
pub fn collect_chunks(items: Vec<serde_json::Value>) -> Vec<ChunkMetadata> {
    items
        .into_iter()
        .filter_map(|item| match ChunkMetadata::deserialize(&item) {
            Ok(chunk) if chunk.page > 0 => Some(chunk),
            Ok(_) => {
                warn!("Dropping chunk with page 0: {}", item);
                None
            }
            Err(e) => {
                warn!("Dropping malformed chunk {}: {}", item, e);
                None
            }
        })
        .collect()
}

// ── Transcript ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            citations: None,
        }
    }

    pub fn with_citations(mut self, citations: Option<Vec<Citation>>) -> Self {
        self.citations = citations;
        self
    }

    /// Citations, or an empty slice.
    pub fn citations(&self) -> &[Citation] {
        self.citations.as_deref().unwrap_or(&[])
    }
}

// ── Citations ────────────────────────────────────────────────────────────

/// Canonical citation stored in a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: ChunkId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// A citation as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CitationSource {
    /// `5` or `"c-5"`
    Bare(ChunkId),
    /// `{"chunk_id": 9, "page": 2, "preview": "..."}`
    Record {
        chunk_id: ChunkId,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default)]
        preview: Option<String>,
    },
}

impl From<CitationSource> for Citation {
    fn from(source: CitationSource) -> Self {
        match source {
            CitationSource::Bare(chunk_id) => Citation {
                chunk_id,
                page: None,
                preview: None,
            },
            CitationSource::Record {
                chunk_id,
                page,
                preview,
            } => Citation {
                chunk_id,
                page,
                preview: preview.filter(|p| !p.trim().is_empty()),
            },
        }
    }
}

/// Normalize the raw `citations` value of an answer.
///
/// Returns `None` unless the value is an array. Elements that match neither
/// shape are dropped with a warning; order is preserved.
pub fn normalize_citations(raw: Option<&serde_json::Value>) -> Option<Vec<Citation>> {
    let items = raw?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match CitationSource::deserialize(item) {
                Ok(source) => Some(Citation::from(source)),
                Err(e) => {
                    warn!("Dropping malformed citation {}: {}", item, e);
                    None
                }
            })
            .collect(),
    )
}
