//! Ordered change delivery for a single session.
//!
//! Backends may coalesce or redeliver changes; the feed only guarantees that a
//! consumer never sees an older revision after a newer one, and that a vanished
//! session is reported once as `None` before the feed ends.

use futures::{StreamExt, stream::BoxStream};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::session_store::SessionChanges,
    error::ServiceError,
    state::{
        SharedState,
        listener::{ListenerSlot, Subscription},
        session::Session,
    },
};

/// Cancelable stream of session states; dropping it stops the underlying watch.
pub type SessionFeed = BoxStream<'static, Result<Option<Session>, ServiceError>>;

/// Admits strictly increasing revisions only.
#[derive(Debug, Default, Clone, Copy)]
pub struct RevisionGate {
    last: Option<u64>,
}

impl RevisionGate {
    /// Whether `revision` is newer than anything admitted so far; records it if so.
    pub fn admit(&mut self, revision: u64) -> bool {
        if self.last.is_some_and(|last| revision <= last) {
            return false;
        }
        self.last = Some(revision);
        true
    }
}

/// Open the change feed of session `id`: its current state first, then every later state.
///
/// An unknown id yields a single `None`.
pub async fn watch_session(state: &SharedState, id: Uuid) -> Result<SessionFeed, ServiceError> {
    let changes = state.store().watch_session(id).await?;
    Ok(ordered_feed(id, changes))
}

/// Apply the revision gate to raw store changes and stop after removal or failure.
fn ordered_feed(id: Uuid, mut changes: SessionChanges) -> SessionFeed {
    let feed = async_stream::stream! {
        let mut gate = RevisionGate::default();
        while let Some(change) = changes.next().await {
            match change {
                Ok(Some(entity)) => {
                    if gate.admit(entity.revision) {
                        yield Ok(Some(Session::from(entity)));
                    } else {
                        debug!(session_id = %id, revision = entity.revision, "dropping stale delivery");
                    }
                }
                Ok(None) => {
                    yield Ok(None);
                    break;
                }
                Err(err) => {
                    warn!(session_id = %id, error = %err, "session change feed failed");
                    yield Err(ServiceError::from(err));
                    break;
                }
            }
        }
    };

    feed.boxed()
}

/// Invoke `listener` with every observed state of session `id` until unsubscribed.
///
/// Must be called from within a tokio runtime; the feed is driven by a spawned task.
/// Storage failures are logged and end the feed without a callback; the listener
/// only hears about vanished sessions (`None`). Poll [`Subscription::is_active`]
/// to tell a dead feed from a quiet game.
pub fn subscribe<F>(state: &SharedState, id: Uuid, listener: F) -> Subscription
where
    F: FnMut(Option<Session>) + Send + 'static,
{
    let slot = ListenerSlot::new(listener);
    let feed_slot = slot.clone();
    let state = state.clone();

    let task = tokio::spawn(async move {
        match watch_session(&state, id).await {
            Ok(feed) => forward(id, feed, &feed_slot).await,
            Err(err) => warn!(session_id = %id, error = %err, "failed to open session feed"),
        }
        feed_slot.close();
        debug!(session_id = %id, "session subscription ended");
    });

    Subscription::with_task(slot, task.abort_handle())
}

async fn forward(id: Uuid, mut feed: SessionFeed, slot: &ListenerSlot<Option<Session>>) {
    while let Some(change) = feed.next().await {
        let change = match change {
            Ok(change) => change,
            Err(err) => {
                debug!(session_id = %id, error = %err, "session subscription lost its feed");
                return;
            }
        };
        if !slot.notify(change) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, SystemTime},
    };

    use futures::{future::BoxFuture, stream};
    use tokio::{sync::mpsc, time::timeout};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{
                Guard, NewSession, ParticipantEntity, SessionEntity, SessionPatch, SessionQuery,
                UpdateOutcome,
            },
            session_store::{MemorySessionStore, SessionStore},
            storage::{StorageError, StorageResult},
        },
        services::session_service,
        state::{AppState, session::Participant},
    };

    fn memory_state() -> (SharedState, MemorySessionStore) {
        let store = MemorySessionStore::new();
        let state = AppState::new(Arc::new(store.clone()), AppConfig::default());
        (state, store)
    }

    /// Store that holds sessions but cannot open change feeds.
    #[derive(Clone, Default)]
    struct UnwatchableStore {
        inner: MemorySessionStore,
    }

    impl SessionStore for UnwatchableStore {
        fn create_session(&self, session: NewSession) -> BoxFuture<'static, StorageResult<SessionEntity>> {
            self.inner.create_session(session)
        }

        fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
            self.inner.find_session(id)
        }

        fn update_session(
            &self,
            id: Uuid,
            guard: Guard,
            patch: SessionPatch,
        ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
            self.inner.update_session(id, guard, patch)
        }

        fn list_sessions(&self, query: SessionQuery) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
            self.inner.list_sessions(query)
        }

        fn watch_session(&self, _id: Uuid) -> BoxFuture<'static, StorageResult<SessionChanges>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "memory",
                    std::io::Error::other("change feed offline"),
                ))
            })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
    }

    async fn wait_until_inactive(subscription: &Subscription) {
        timeout(Duration::from_secs(1), async {
            while subscription.is_active() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn gate_drops_stale_and_repeated_revisions() {
        let mut gate = RevisionGate::default();
        assert!(gate.admit(2));
        assert!(!gate.admit(2));
        assert!(!gate.admit(1));
        assert!(gate.admit(5));
    }

    #[tokio::test]
    async fn stale_deliveries_are_dropped_and_removal_ends_the_feed() {
        let entity = NewSession::new(ParticipantEntity {
            id: "alice".into(),
            name: "Alice".into(),
        })
        .into_entity(Uuid::new_v4(), SystemTime::now());
        let at = |revision: u64| -> StorageResult<Option<SessionEntity>> {
            let mut delivered = entity.clone();
            delivered.revision = revision;
            Ok(Some(delivered))
        };

        let raw = stream::iter(vec![at(1), at(3), at(2), at(3), at(4), Ok(None), at(5)]).boxed();
        let observed = ordered_feed(entity.id, raw)
            .map(|change| change.unwrap().map(|session| session.revision))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(observed, vec![Some(1), Some(3), Some(4), None]);
    }

    #[tokio::test]
    async fn feed_reports_removal_once_and_ends() {
        let (state, store) = memory_state();
        let created = session_service::create_session(&state, Participant::new("a", "Ann"))
            .await
            .unwrap();
        let mut feed = watch_session(&state, created.id).await.unwrap();

        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(first.map(|s| s.revision), Some(1));

        store.remove(created.id);
        assert_eq!(feed.next().await.unwrap().unwrap(), None);
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn subscriber_sees_join_and_stops_after_unsubscribe() {
        let (state, _store) = memory_state();
        let created = session_service::create_session(&state, Participant::new("a", "Ann"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subscribe(&state, created.id, move |change: Option<Session>| {
            let _ = tx.send(change.map(|s| s.revision));
        });

        let wait = Duration::from_secs(1);
        assert_eq!(timeout(wait, rx.recv()).await.unwrap(), Some(Some(1)));

        session_service::join_session(&state, created.id, Participant::new("b", "Bea"))
            .await
            .unwrap();
        assert_eq!(timeout(wait, rx.recv()).await.unwrap(), Some(Some(2)));

        assert!(subscription.is_active());
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        session_service::apply_move(&state, created.id, 0, "a")
            .await
            .unwrap();

        // the callback, and with it the only sender, is gone
        assert_eq!(timeout(wait, rx.recv()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscribing_to_unknown_session_reports_none() {
        let (state, _store) = memory_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = subscribe(&state, Uuid::new_v4(), move |change: Option<Session>| {
            let _ = tx.send(change.is_none());
        });
        assert_eq!(
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn failed_feed_deactivates_subscription_without_callbacks() {
        let store = UnwatchableStore::default();
        let state = AppState::new(Arc::new(store), AppConfig::default());
        let created = session_service::create_session(&state, Participant::new("a", "Ann"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel::<Option<u64>>();
        let subscription = subscribe(&state, created.id, move |change: Option<Session>| {
            let _ = tx.send(change.map(|s| s.revision));
        });

        wait_until_inactive(&subscription).await;
        // the task ended and dropped the callback together with its sender
        assert_eq!(timeout(Duration::from_secs(1), rx.recv()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn removed_session_ends_subscription() {
        let (state, store) = memory_state();
        let created = session_service::create_session(&state, Participant::new("a", "Ann"))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subscribe(&state, created.id, move |change: Option<Session>| {
            let _ = tx.send(change.map(|s| s.revision));
        });
        let wait = Duration::from_secs(1);
        assert_eq!(timeout(wait, rx.recv()).await.unwrap(), Some(Some(1)));

        store.remove(created.id);
        assert_eq!(timeout(wait, rx.recv()).await.unwrap(), Some(None));
        wait_until_inactive(&subscription).await;
    }
}
