//! In-process session store backed by one `tokio::sync::watch` channel per document.
//!
//! Conditional updates run under the channel's write lock, so the guard check,
//! the write and the change notification form a single atomic step.

use std::sync::Arc;

use dashmap::DashMap;
use futures::{StreamExt, future::BoxFuture, stream};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    clock::MonotonicClock,
    models::{
        Guard, NewSession, SessionEntity, SessionPatch, SessionQuery, UpdateOutcome,
        sort_newest_first,
    },
    session_store::{SessionChanges, SessionStore},
    storage::StorageResult,
};

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    documents: DashMap<Uuid, watch::Sender<Option<SessionEntity>>>,
    clock: MonotonicClock,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.inner.documents.len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.inner.documents.is_empty()
    }

    /// Drop a document, notifying watchers that it is gone.
    ///
    /// Session logic never deletes; this models an external retention policy.
    pub fn remove(&self, id: Uuid) -> bool {
        match self.inner.documents.remove(&id) {
            Some((_, sender)) => {
                sender.send_replace(None);
                debug!(session_id = %id, "session document removed");
                true
            }
            None => false,
        }
    }

    fn insert(&self, session: NewSession) -> SessionEntity {
        let entity = session.into_entity(Uuid::new_v4(), self.inner.clock.now());
        let (sender, _receiver) = watch::channel(Some(entity.clone()));
        self.inner.documents.insert(entity.id, sender);
        entity
    }

    fn find(&self, id: Uuid) -> Option<SessionEntity> {
        self.inner
            .documents
            .get(&id)
            .and_then(|sender| sender.borrow().clone())
    }

    fn update(&self, id: Uuid, guard: Guard, patch: SessionPatch) -> UpdateOutcome {
        let Some(sender) = self.inner.documents.get(&id) else {
            return UpdateOutcome::Missing;
        };

        let mut outcome = UpdateOutcome::Rejected;
        sender.send_if_modified(|slot| {
            let Some(current) = slot.as_mut() else {
                outcome = UpdateOutcome::Missing;
                return false;
            };
            if !guard.admits(current) {
                return false;
            }
            patch.apply(current, self.inner.clock.now());
            outcome = UpdateOutcome::Applied(current.clone());
            true
        });

        outcome
    }

    fn list(&self, query: SessionQuery) -> Vec<SessionEntity> {
        let mut sessions = self
            .inner
            .documents
            .iter()
            .filter_map(|entry| entry.value().borrow().clone())
            .filter(|entity| query.matches(entity))
            .collect::<Vec<_>>();
        sort_newest_first(&mut sessions);
        sessions
    }

    fn watch(&self, id: Uuid) -> SessionChanges {
        match self.inner.documents.get(&id) {
            Some(sender) => WatchStream::new(sender.subscribe()).map(Ok).boxed(),
            None => stream::once(async { Ok(None) }).boxed(),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn create_session(&self, session: NewSession) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert(session)) })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find(id)) })
    }

    fn update_session(
        &self,
        id: Uuid,
        guard: Guard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.update(id, guard, patch)) })
    }

    fn list_sessions(&self, query: SessionQuery) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list(query)) })
    }

    fn watch_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<SessionChanges>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.watch(id)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
