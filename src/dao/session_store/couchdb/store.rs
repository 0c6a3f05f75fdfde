use std::{sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    clock::MonotonicClock,
    models::{
        Guard, NewSession, SessionEntity, SessionPatch, SessionQuery, UpdateOutcome,
        sort_newest_first,
    },
    session_store::{SessionChanges, SessionStore},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchSessionDocument, END_SUFFIX, PutResponse,
        SESSION_PREFIX, session_doc_id,
    },
};

const CHANGES: &str = "_changes";

#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    longpoll_timeout: Duration,
    clock: Arc<MonotonicClock>,
}

/// Result of a `PUT` carrying an expected `_rev`.
enum PutOutcome {
    Written,
    Conflict,
}

impl CouchSessionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            longpoll_timeout: config.longpoll_timeout,
            clock: Arc::new(MonotonicClock::new()),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.with_auth(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .with_auth(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    debug!(database = %database, "created CouchDB database");
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Write `document`; CouchDB answers 409 when its `_rev` is no longer current.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<PutOutcome>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => {
                let written = response.json::<PutResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                debug!(doc_id, rev = %written.rev, "stored CouchDB document");
                Ok(PutOutcome::Written)
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })
            })
            .collect()
    }

    /// One `_changes` round for a single document.
    ///
    /// Without `since` the answer is immediate and holds the latest revision;
    /// with it, CouchDB holds the request open until the document changes.
    async fn changes(&self, doc_id: &str, since: Option<&Value>) -> CouchResult<ChangesResponse> {
        let mut query = vec![
            ("filter", "_doc_ids".to_string()),
            ("doc_ids", format!("[\"{doc_id}\"]")),
            ("include_docs", "true".to_string()),
        ];
        if let Some(since) = since {
            let since = match since {
                Value::String(seq) => seq.clone(),
                other => other.to_string(),
            };
            query.push(("feed", "longpoll".to_string()));
            query.push(("since", since));
            query.push((
                "timeout",
                self.longpoll_timeout.as_millis().to_string(),
            ));
        }

        let response = self
            .request(Method::GET, CHANGES)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }

    async fn find(&self, id: Uuid) -> CouchResult<Option<(SessionEntity, Option<String>)>> {
        let doc_id = session_doc_id(id);
        let Some(doc) = self.get_document::<CouchSessionDocument>(&doc_id).await? else {
            return Ok(None);
        };
        let rev = doc.rev.clone();
        Ok(Some((SessionEntity::try_from(doc)?, rev)))
    }

    fn watch(&self, id: Uuid) -> SessionChanges {
        let store = self.clone();
        let doc_id = session_doc_id(id);

        async_stream::stream! {
            let mut since: Option<Value> = None;
            loop {
                let page = match store.changes(&doc_id, since.as_ref()).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(StorageError::from(err));
                        break;
                    }
                };

                if since.is_none() && page.results.is_empty() {
                    yield Ok(None);
                    break;
                }
                since = Some(page.last_seq);

                let mut finished = false;
                for row in page.results {
                    if row.deleted {
                        yield Ok(None);
                        finished = true;
                        break;
                    }
                    let Some(doc) = row.doc else {
                        continue;
                    };
                    let decoded = from_value::<CouchSessionDocument>(doc)
                        .map_err(|source| CouchDaoError::DeserializeValue {
                            path: CHANGES.to_string(),
                            source,
                        })
                        .and_then(SessionEntity::try_from);
                    match decoded {
                        Ok(entity) => yield Ok(Some(entity)),
                        Err(err) => {
                            yield Err(StorageError::from(err));
                            finished = true;
                            break;
                        }
                    }
                }

                if finished {
                    break;
                }
            }
        }
        .boxed()
    }
}

impl SessionStore for CouchSessionStore {
    fn create_session(&self, session: NewSession) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let entity = session.into_entity(Uuid::new_v4(), store.clock.now());
            let doc = CouchSessionDocument::from((entity.clone(), None));
            match store.put_document(&doc.id, &doc).await? {
                PutOutcome::Written => Ok(entity),
                PutOutcome::Conflict => Err(CouchDaoError::RequestStatus {
                    path: doc.id,
                    status: StatusCode::CONFLICT,
                }
                .into()),
            }
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let found = store.find(id).await?;
            Ok(found.map(|(entity, _)| entity))
        })
    }

    fn update_session(
        &self,
        id: Uuid,
        guard: Guard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let Some((mut entity, rev)) = store.find(id).await? else {
                return Ok(UpdateOutcome::Missing);
            };
            if !guard.admits(&entity) {
                return Ok(UpdateOutcome::Rejected);
            }

            patch.apply(&mut entity, store.clock.now());
            let doc = CouchSessionDocument::from((entity.clone(), rev));
            // the guard was checked against `rev`; a concurrent writer makes CouchDB answer 409
            match store.put_document(&doc.id, &doc).await? {
                PutOutcome::Written => Ok(UpdateOutcome::Applied(entity)),
                PutOutcome::Conflict => Ok(UpdateOutcome::Rejected),
            }
        })
    }

    fn list_sessions(&self, query: SessionQuery) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchSessionDocument>(SESSION_PREFIX)
                .await?;
            let mut sessions = docs
                .into_iter()
                .map(SessionEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            sessions.retain(|entity| query.matches(entity));
            sort_newest_first(&mut sessions);
            Ok(sessions)
        })
    }

    fn watch_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<SessionChanges>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.watch(id)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .with_auth(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }
}
