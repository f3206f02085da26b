//! Cache of fetched citation documents.
//!
//! Each document path owns one shared cell. The first `resolve` for a path
//! fetches; everybody else awaits that same fetch. Every `resolve` opens a
//! view on the shared artifact. Once the last open view is released, the
//! artifact is revoked and evicted, so handles outliving it stop rendering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::OnceCell;

use bgchat_client::{Backend, Document};
use bgchat_types::{ChatError, CitationRef};

const PDF_MAGIC: &[u8] = b"%PDF-";
const VIEWER_OPTIONS: &str = "toolbar=1&navpanes=0&scrollbar=0";

type Slot = Arc<OnceCell<Result<Arc<Artifact>, ChatError>>>;

#[derive(Debug)]
struct Artifact {
    id: u64,
    document_path: String,
    bytes: Bytes,
    /// Unreleased views. Changed only under the slot lock.
    views: AtomicUsize,
    revoked: AtomicBool,
}

/// Display handle for a cached document.
///
/// Clones share one view; releasing any of them releases the view.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    artifact: Arc<Artifact>,
    released: Arc<AtomicBool>,
    page: Option<u32>,
}

impl ArtifactHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.artifact.id
    }

    #[must_use]
    pub fn document_path(&self) -> &str {
        &self.artifact.document_path
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.artifact.bytes
    }

    #[must_use]
    pub const fn page(&self) -> Option<u32> {
        self.page
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.released.load(Ordering::Acquire) || self.artifact.revoked.load(Ordering::Acquire)
    }

    /// Viewer fragment, e.g. `toolbar=1&navpanes=0&scrollbar=0&page=4`.
    #[must_use]
    pub fn viewer_fragment(&self) -> String {
        match self.page {
            Some(page) => format!("{VIEWER_OPTIONS}&page={page}"),
            None => VIEWER_OPTIONS.to_string(),
        }
    }

    /// True if both handles point at the same fetched artifact.
    #[must_use]
    pub fn same_artifact(&self, other: &ArtifactHandle) -> bool {
        Arc::ptr_eq(&self.artifact, &other.artifact)
    }
}

pub struct ArtifactCache {
    backend: Arc<dyn Backend>,
    slots: Mutex<HashMap<String, Slot>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

impl ArtifactCache {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Fetch (or reuse) the document behind `citation`.
    pub async fn resolve(&self, citation: &CitationRef) -> Result<ArtifactHandle, ChatError> {
        let path = citation.document_path();
        loop {
            let slot = {
                let mut slots = self.lock();
                Arc::clone(slots.entry(path.to_string()).or_default())
            };

            let result = slot.get_or_init(|| self.fetch(path)).await.clone();
            match result {
                Ok(artifact) => {
                    if self.open_view(&artifact) {
                        return Ok(ArtifactHandle {
                            artifact,
                            released: Arc::new(AtomicBool::new(false)),
                            page: citation.page(),
                        });
                    }
                    // Released while we waited; start over with a fresh slot.
                    self.evict(path, &slot);
                }
                Err(error) => {
                    self.evict(path, &slot);
                    return Err(error);
                }
            }
        }
    }

    /// Close the view behind `handle`.
    ///
    /// The artifact is revoked and its bytes dropped once no other view of it
    /// is open. Returns `false` if this view was already released.
    pub fn release(&self, handle: &ArtifactHandle) -> bool {
        if handle.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        let artifact = &handle.artifact;
        let mut slots = self.lock();
        if artifact.revoked.load(Ordering::Acquire) {
            return true;
        }
        let remaining = artifact.views.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 {
            tracing::debug!(path = %artifact.document_path, id = artifact.id, remaining, "Closed artifact view");
            return true;
        }
        artifact.revoked.store(true, Ordering::Release);
        if slots
            .get(&artifact.document_path)
            .is_some_and(|slot| holds(slot, artifact))
        {
            slots.remove(&artifact.document_path);
        }
        tracing::debug!(path = %artifact.document_path, id = artifact.id, "Released artifact");
        true
    }

    /// Revoke every cached artifact.
    pub fn release_all(&self) {
        let drained: Vec<Slot> = self.lock().drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            if let Some(Ok(artifact)) = slot.get() {
                artifact.revoked.store(true, Ordering::Release);
            }
        }
    }

    /// Paths with a cached or in-flight fetch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fetch(&self, path: &str) -> Result<Arc<Artifact>, ChatError> {
        tracing::debug!(path, "Fetching document");
        let document = self.backend.fetch_document(path).await?;
        classify(&document).inspect_err(|_| {
            tracing::warn!(
                path,
                content_type = document.content_type.as_deref().unwrap_or("<none>"),
                "Fetched document is not a PDF"
            );
        })?;
        Ok(Arc::new(Artifact {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            document_path: path.to_string(),
            bytes: document.bytes,
            views: AtomicUsize::new(0),
            revoked: AtomicBool::new(false),
        }))
    }

    fn open_view(&self, artifact: &Artifact) -> bool {
        let _slots = self.lock();
        if artifact.revoked.load(Ordering::Acquire) {
            return false;
        }
        artifact.views.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn evict(&self, path: &str, slot: &Slot) {
        let mut slots = self.lock();
        if slots.get(path).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(path);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn holds(slot: &Slot, artifact: &Arc<Artifact>) -> bool {
    matches!(slot.get(), Some(Ok(current)) if Arc::ptr_eq(current, artifact))
}

fn classify(document: &Document) -> Result<(), ChatError> {
    let is_pdf = match document.content_type.as_deref() {
        Some(content_type) => content_type.to_ascii_lowercase().contains("pdf"),
        None => document.bytes.starts_with(PDF_MAGIC),
    };
    if is_pdf {
        Ok(())
    } else {
        Err(ChatError::InvalidArtifact)
    }
}
