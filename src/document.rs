//! Document identity + chunk-metadata cache.
//!
//! A [`DocumentSession`] tracks which document is current and the chunk list
//! the service reported for it. Two writers can race on the cache: an explicit
//! [`DocumentSession::load`] and the background prefetch started by a
//! successful upload. The rule is simple:
//!
//! * the most recently *resolved* fetch for the current document wins,
//! * a fetch started before the current document was bound is discarded.
//!
//! The second rule is enforced with a generation counter that is bumped every
//! time the bound identity changes, so switching A → B → A still discards a
//! slow response for the first A.

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::model::{ChunkMetadata, DocumentId};
use crate::observer::SharedObserver;
use reqwest::Url;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ChunkCache {
    current: Option<DocumentId>,
    generation: u64,
    chunks: Arc<[ChunkMetadata]>,
}

impl ChunkCache {
    /// Bind `doc_id`, clearing chunks and bumping the generation if it is a
    /// different document. Returns the generation a fetch must match.
    fn bind(&mut self, doc_id: &DocumentId) -> u64 {
        if self.current.as_ref() != Some(doc_id) {
            self.current = Some(doc_id.clone());
            self.generation += 1;
            self.chunks = Arc::default();
        }
        self.generation
    }
}

/// Shared handle onto the chunk cache. Clones see the same cache.
#[derive(Clone)]
pub struct DocumentSession {
    api: ApiClient,
    observer: Option<SharedObserver>,
    cache: Arc<RwLock<ChunkCache>>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("DocumentSession")
            .field("current", &cache.current)
            .field("generation", &cache.generation)
            .field("chunks", &cache.chunks.len())
            .finish()
    }
}

impl DocumentSession {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self {
            api,
            observer: config.observer.clone(),
            cache: Arc::default(),
        }
    }

    /// The document the cache currently describes.
    pub fn current(&self) -> Option<DocumentId> {
        self.read(|c| c.current.clone())
    }

    /// Ordered, read-only snapshot of the cached chunks.
    pub fn chunks(&self) -> Arc<[ChunkMetadata]> {
        self.read(|c| Arc::clone(&c.chunks))
    }

    /// Make `doc_id` the current document without fetching.
    pub fn bind(&self, doc_id: &DocumentId) {
        self.write(|c| {
            c.bind(doc_id);
        });
    }

    /// Fetch the chunk list for `doc_id` and replace the cache wholesale.
    ///
    /// A failed fetch stores (and returns) an empty list: callers render
    /// "no chunks available" instead of handling an error.
    pub async fn load(&self, doc_id: &DocumentId) -> Arc<[ChunkMetadata]> {
        let generation = self.write(|c| c.bind(doc_id));

        let chunks: Arc<[ChunkMetadata]> = match self.api.list_chunks(doc_id).await {
            Ok(list) => list.into(),
            Err(e) => {
                warn!("Chunk listing for document {} failed: {}", doc_id, e);
                Arc::default()
            }
        };

        let applied = self.write(|c| {
            if c.generation == generation {
                c.chunks = Arc::clone(&chunks);
                true
            } else {
                false
            }
        });

        if applied {
            debug!("Document {}: cached {} chunks", doc_id, chunks.len());
            if let Some(ref obs) = self.observer {
                obs.on_chunks_loaded(doc_id, chunks.len());
            }
        } else {
            debug!("Document {}: discarding stale chunk listing", doc_id);
        }
        chunks
    }

    /// Start [`load`](Self::load) in the background and return immediately.
    ///
    /// `doc_id` is bound before this returns, so [`current`](Self::current)
    /// reflects it at once. Returns `None` when called outside a tokio
    /// runtime; the cache is then left for an explicit `load`.
    pub fn prefetch(&self, doc_id: DocumentId) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        self.bind(&doc_id);
        let session = self.clone();
        info!("Prefetching chunk previews for document {}", doc_id);
        Some(handle.spawn(async move {
            session.load(&doc_id).await;
        }))
    }

    /// Where the authoritative document artifact can be embedded from.
    /// A pure mapping from the identity; no network I/O.
    pub fn preview_reference(&self, doc_id: &DocumentId) -> Url {
        self.api.artifact_url(doc_id)
    }

    /// Probe whether the artifact can actually be embedded.
    pub async fn can_embed(&self, doc_id: &DocumentId) -> bool {
        self.api.probe_artifact(doc_id).await
    }

    fn read<R>(&self, f: impl FnOnce(&ChunkCache) -> R) -> R {
        let guard = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut ChunkCache) -> R) -> R {
        let mut guard = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
