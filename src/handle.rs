//! Revocable in-memory content handles
//!
//! A [`ContentHandle`] is the native equivalent of a browser object URL: a name
//! under which retrieved bytes can be rendered, valid until it is revoked.
//! Handles are registered with a [`HandleStore`] and revoked exactly once, either
//! via [`ContentHandle::release`] or when the handle is dropped.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Identifier of a registered handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry that backs content handles
pub trait HandleStore: Send + Sync {
    /// Register bytes and return the new handle's id and URL
    fn register(&self, bytes: Bytes, mime_type: &str) -> (HandleId, String);

    /// Revoke a handle; the URL stops resolving
    fn revoke(&self, id: HandleId);
}

/// Exclusively owned reference to retrieved bytes
///
/// Not `Clone`: ownership is the revocation guarantee.
pub struct ContentHandle {
    id: HandleId,
    url: String,
    mime_type: String,
    len: u64,
    store: Arc<dyn HandleStore>,
    released: bool,
}

impl ContentHandle {
    /// Register `bytes` with `store` and take ownership of the new handle
    pub fn create(store: Arc<dyn HandleStore>, bytes: Bytes, mime_type: &str) -> Self {
        let len = bytes.len() as u64;
        let (id, url) = store.register(bytes, mime_type);
        debug!(handle = %id, len, "content handle created");
        Self {
            id,
            url,
            mime_type: mime_type.to_string(),
            len,
            store,
            released: false,
        }
    }

    /// Handle id
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// URL under which the content can be rendered
    pub fn url(&self) -> &str {
        &self.url
    }

    /// MIME type the content was registered with
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Content length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True for zero-length content
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrowable description of this handle
    pub fn snapshot(&self) -> HandleSnapshot {
        HandleSnapshot {
            id: self.id,
            url: self.url.clone(),
            mime_type: self.mime_type.clone(),
            len: self.len,
        }
    }

    /// Revoke the handle now
    pub fn release(mut self) {
        self.revoke_once();
    }

    fn revoke_once(&mut self) {
        if !self.released {
            self.released = true;
            self.store.revoke(self.id);
            debug!(handle = %self.id, "content handle revoked");
        }
    }
}

impl Drop for ContentHandle {
    fn drop(&mut self) {
        self.revoke_once();
    }
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHandle")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("mime_type", &self.mime_type)
            .field("len", &self.len)
            .finish()
    }
}

/// Plain-data view of a handle, safe to hand to a renderer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandleSnapshot {
    /// Handle id
    pub id: HandleId,
    /// URL under which the content can be rendered
    pub url: String,
    /// MIME type
    pub mime_type: String,
    /// Content length in bytes
    pub len: u64,
}

#[derive(Default)]
struct StoreState {
    live: HashMap<HandleId, (Bytes, String)>,
    revocations: HashMap<HandleId, u32>,
}

/// In-process [`HandleStore`] that keeps bytes in memory
///
/// Also records how often each handle was revoked, which makes the
/// exactly-once guarantee checkable.
#[derive(Default)]
pub struct MemoryHandleStore {
    next_id: AtomicU64,
    state: Mutex<StoreState>,
}

impl MemoryHandleStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Bytes behind a live handle
    pub fn resolve(&self, id: HandleId) -> Option<Bytes> {
        self.state().live.get(&id).map(|(b, _)| b.clone())
    }

    /// Bytes behind a live handle URL
    pub fn resolve_url(&self, url: &str) -> Option<Bytes> {
        let id = url.strip_prefix("blob:sharelink/")?.parse().ok()?;
        self.resolve(HandleId(id))
    }

    /// Number of handles not yet revoked
    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    /// How many times `id` was revoked
    pub fn revocations(&self, id: HandleId) -> u32 {
        self.state().revocations.get(&id).copied().unwrap_or(0)
    }

    /// Total revocations across all handles
    pub fn total_revocations(&self) -> u32 {
        self.state().revocations.values().sum()
    }
}

impl HandleStore for MemoryHandleStore {
    fn register(&self, bytes: Bytes, mime_type: &str) -> (HandleId, String) {
        let id = HandleId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let url = format!("blob:sharelink/{id}");
        self.state()
            .live
            .insert(id, (bytes, mime_type.to_string()));
        (id, url)
    }

    fn revoke(&self, id: HandleId) {
        let mut state = self.state();
        state.live.remove(&id);
        *state.revocations.entry(id).or_insert(0) += 1;
    }
}
