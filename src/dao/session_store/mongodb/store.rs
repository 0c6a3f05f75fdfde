use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::doc,
    change_stream::event::OperationType,
    options::{FullDocumentType, IndexOptions, ReturnDocument},
};
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoSessionDocument, TIMESTAMP_RESOLUTION, doc_id, guarded},
};
use crate::dao::{
    clock::MonotonicClock,
    models::{
        Guard, NewSession, SessionEntity, SessionPatch, SessionQuery, UpdateOutcome,
        sort_newest_first,
    },
    session_store::{SessionChanges, SessionStore},
    storage::{StorageError, StorageResult},
};

const SESSION_COLLECTION_NAME: &str = "sessions";

#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: Database,
    clock: MonotonicClock,
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database,
                clock: MonotonicClock::with_resolution(TIMESTAMP_RESOLUTION),
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1, "created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_status_created_idx".to_owned()))
                    .build(),
            )
            .build();

        self.collection()
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "status,created_at",
                source,
            })?;

        Ok(())
    }

    fn collection(&self) -> Collection<MongoSessionDocument> {
        self.inner
            .database
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn find(&self, id: Uuid) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .collection()
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        document.map(SessionEntity::try_from).transpose()
    }

    /// Change stream for one document, opened before the initial read so no change is lost
    /// in between; the revision gate downstream drops the overlap.
    async fn watch(&self, id: Uuid) -> MongoResult<SessionChanges> {
        let mut events = self
            .collection()
            .watch()
            .pipeline(vec![doc! { "$match": { "documentKey._id": id.to_string() } }])
            .full_document(FullDocumentType::UpdateLookup)
            .await
            .map_err(|source| MongoDaoError::WatchSession { id, source })?;
        let current = self.find(id).await?;

        let changes = async_stream::stream! {
            match current {
                None => yield Ok(None),
                Some(current) => {
                    yield Ok(Some(current));

                    while let Some(event) = events.next().await {
                        let event = match event {
                            Ok(event) => event,
                            Err(source) => {
                                yield Err(StorageError::from(MongoDaoError::WatchSession { id, source }));
                                break;
                            }
                        };

                        if matches!(
                            event.operation_type,
                            OperationType::Delete | OperationType::Drop | OperationType::Invalidate
                        ) {
                            yield Ok(None);
                            break;
                        }

                        // update lookups race with deletes and come back empty; the delete event follows
                        let Some(document) = event.full_document else {
                            continue;
                        };
                        match SessionEntity::try_from(document) {
                            Ok(entity) => yield Ok(Some(entity)),
                            Err(err) => {
                                yield Err(StorageError::from(err));
                                break;
                            }
                        }
                    }
                }
            }
        };

        Ok(changes.boxed())
    }
}

impl SessionStore for MongoSessionStore {
    fn create_session(&self, session: NewSession) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let entity = session.into_entity(Uuid::new_v4(), store.inner.clock.now());
            store
                .collection()
                .insert_one(MongoSessionDocument::from(entity.clone()))
                .await
                .map_err(|source| MongoDaoError::InsertSession {
                    id: entity.id,
                    source,
                })?;
            Ok(entity)
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find(id).await.map_err(Into::into) })
    }

    fn update_session(
        &self,
        id: Uuid,
        guard: Guard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(mut entity) = store.find(id).await? else {
                return Ok(UpdateOutcome::Missing);
            };
            if !guard.admits(&entity) {
                return Ok(UpdateOutcome::Rejected);
            }

            patch.apply(&mut entity, store.inner.clock.now());
            let replaced = store
                .collection()
                .find_one_and_replace(guarded(id, guard), MongoSessionDocument::from(entity))
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateSession { id, source })?;

            match replaced {
                Some(document) => Ok(UpdateOutcome::Applied(SessionEntity::try_from(document)?)),
                None => {
                    debug!(session_id = %id, revision = guard.revision, "guarded replace matched nothing");
                    Ok(UpdateOutcome::Rejected)
                }
            }
        })
    }

    fn list_sessions(&self, query: SessionQuery) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = match query.status {
                Some(status) => doc! { "status": status.as_str() },
                None => doc! {},
            };
            let documents: Vec<MongoSessionDocument> = store
                .collection()
                .find(filter)
                .sort(doc! { "created_at": -1 })
                .await
                .map_err(|source| MongoDaoError::ListSessions { source })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::ListSessions { source })?;

            let mut sessions = documents
                .into_iter()
                .map(SessionEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            sort_newest_first(&mut sessions);
            Ok(sessions)
        })
    }

    fn watch_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<SessionChanges>> {
        let store = self.clone();
        Box::pin(async move { store.watch(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .database
                .run_command(doc! { "ping": 1 })
                .await
                .map_err(|source| MongoDaoError::HealthPing { source })?;
            Ok(())
        })
    }
}
