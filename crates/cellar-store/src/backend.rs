//! Persistence backends.
//!
//! The store needs exactly three operations, all keyed by [`SessionId`]:
//! fetch one document, replace-or-insert one document, delete one
//! document. Anything that can do those atomically per key can back a
//! store. Concurrent writers to the same key get last-writer-wins; the
//! store adds no locking of its own.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{SessionDocument, SessionId};

/// Document storage keyed by session identifier.
///
/// Futures must be `Send` so a store can be driven from any runtime
/// thread. Implementations may write `async fn` directly.
pub trait SessionBackend: Send + Sync + 'static {
    /// The backend's own error type, passed through to callers untouched.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the document for `id`. `Ok(None)` if there is none.
    fn find_one(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionDocument>, Self::Error>> + Send;

    /// Replaces the document with the same id, or inserts it.
    fn upsert_one(
        &self,
        document: &SessionDocument,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Deletes the document for `id`. Deleting a missing document succeeds.
    fn delete_one(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// An in-process backend for tests and single-node development.
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<RwLock<HashMap<SessionId, SessionDocument>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored document, if any.
    pub async fn get(&self, id: &SessionId) -> Option<SessionDocument> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl SessionBackend for MemoryBackend {
    type Error = Infallible;

    async fn find_one(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionDocument>, Self::Error> {
        Ok(self.get(id).await)
    }

    async fn upsert_one(
        &self,
        document: &SessionDocument,
    ) -> Result<(), Self::Error> {
        self.documents
            .write()
            .await
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn delete_one(&self, id: &SessionId) -> Result<(), Self::Error> {
        self.documents.write().await.remove(id);
        Ok(())
    }
}
