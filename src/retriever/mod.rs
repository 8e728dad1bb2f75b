//! Content retrieval for preview and download
//!
//! The [`ContentRetriever`] turns fetched bytes into [`ContentHandle`]s. For
//! previews it owns at most one current handle: installing a new one revokes the
//! previous one first, and a monotonic request sequence makes sure only the most
//! recently issued preview request can become current. Completions that arrive
//! after a newer request was issued are dropped without touching visible state.
//!
//! Downloads go through a [`DownloadSink`]; their handle is transient and revoked
//! as soon as the sink returns.

mod sink;

pub use sink::FileSystemSink;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::classifier::{self, ClassifiedError};
use crate::error::Result;
use crate::handle::{ContentHandle, HandleSnapshot, HandleStore};
use crate::types::{AccessCredential, ShareLink, ShareToken};

/// Source of file content for a share token
///
/// [`ShareApi`](crate::client::ShareApi) is the HTTP implementation. A password,
/// when given, must travel in a request header and never in the URL.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the bytes behind `token`
    async fn fetch(
        &self,
        token: &ShareToken,
        password: Option<&str>,
    ) -> std::result::Result<Bytes, ClassifiedError>;
}

/// Destination for downloaded files
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Persist `bytes` under (a sanitised form of) `file_name`
    ///
    /// Returns where the file ended up.
    async fn save(&self, file_name: &str, handle: &HandleSnapshot, bytes: Bytes)
    -> Result<PathBuf>;
}

/// Result of a preview retrieval
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreviewRetrieval {
    /// The content is now the current handle
    Installed(HandleSnapshot),
    /// A newer request was issued meanwhile; this result was discarded
    Superseded,
}

/// Retrieves content and manages the lifetime of its handles
pub struct ContentRetriever {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn HandleStore>,
    sink: Arc<dyn DownloadSink>,
    current: Mutex<Option<ContentHandle>>,
    sequence: AtomicU64,
}

impl ContentRetriever {
    /// Create a retriever
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn HandleStore>,
        sink: Arc<dyn DownloadSink>,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            current: Mutex::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    fn current_slot(&self) -> MutexGuard<'_, Option<ContentHandle>> {
        self.current.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Fetch content for preview and install it as the current handle
    ///
    /// Failures of a superseded request are discarded as well.
    pub async fn retrieve_for_preview(
        &self,
        link: &ShareLink,
        credential: &AccessCredential,
    ) -> std::result::Result<PreviewRetrieval, ClassifiedError> {
        let ticket = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(token = %link.token, ticket, "preview retrieval issued");

        let fetched = self.source.fetch(&link.token, credential.secret()).await;

        let mut slot = self.current_slot();
        if self.sequence.load(Ordering::SeqCst) != ticket {
            debug!(token = %link.token, ticket, "discarding stale preview response");
            return Ok(PreviewRetrieval::Superseded);
        }

        let bytes = fetched?;
        if let Some(previous) = slot.take() {
            previous.release();
        }
        let handle = ContentHandle::create(Arc::clone(&self.store), bytes, &link.mime_type);
        let snapshot = handle.snapshot();
        *slot = Some(handle);

        info!(token = %link.token, handle = %snapshot.id, len = snapshot.len, "preview ready");
        Ok(PreviewRetrieval::Installed(snapshot))
    }

    /// Fetch content and hand it to the download sink under `file_name`
    ///
    /// The handle created for the transfer is revoked right after the sink
    /// returns and is never cached.
    pub async fn retrieve_for_download(
        &self,
        link: &ShareLink,
        file_name: &str,
        credential: &AccessCredential,
    ) -> std::result::Result<PathBuf, ClassifiedError> {
        debug!(token = %link.token, file_name, "download retrieval issued");
        let bytes = self.source.fetch(&link.token, credential.secret()).await?;

        let handle = ContentHandle::create(Arc::clone(&self.store), bytes.clone(), &link.mime_type);
        let saved = self.sink.save(file_name, &handle.snapshot(), bytes).await;
        handle.release();

        match saved {
            Ok(path) => {
                info!(token = %link.token, path = %path.display(), "download saved");
                Ok(path)
            }
            Err(e) => {
                warn!(token = %link.token, file_name, error = %e, "download could not be saved");
                Err(classifier::local_failure(e.to_string()))
            }
        }
    }

    /// The current preview handle, if any
    pub fn current(&self) -> Option<HandleSnapshot> {
        self.current_slot().as_ref().map(ContentHandle::snapshot)
    }

    /// Revoke the current handle and invalidate in-flight preview requests
    pub fn teardown(&self) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.current_slot().take() {
            handle.release();
        }
    }
}

impl Drop for ContentRetriever {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
