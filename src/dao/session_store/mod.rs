#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    Guard, NewSession, SessionEntity, SessionPatch, SessionQuery, UpdateOutcome,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use uuid::Uuid;

pub use memory::MemorySessionStore;

/// Change feed for one session document. Yields the current document first,
/// then every observed change; `None` means the document no longer exists.
///
/// Backends may coalesce successive changes and may redeliver a document.
pub type SessionChanges = BoxStream<'static, StorageResult<Option<SessionEntity>>>;

/// Abstraction over the shared document store holding game sessions.
///
/// Every mutation goes through [`SessionStore::update_session`], which must apply
/// the patch atomically if and only if the guard still holds.
pub trait SessionStore: Send + Sync {
    fn create_session(&self, session: NewSession) -> BoxFuture<'static, StorageResult<SessionEntity>>;
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    fn update_session(
        &self,
        id: Uuid,
        guard: Guard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>>;
    fn list_sessions(&self, query: SessionQuery) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>>;
    fn watch_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<SessionChanges>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
