use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{NewSession, SessionPatch, UpdateOutcome},
        session_store::SessionStore,
    },
    error::ServiceError,
    state::{
        SharedState,
        rules::RuleViolation,
        session::{Participant, Session},
    },
};

/// Open a new waiting session with `creator` seated as X.
pub async fn create_session(
    state: &SharedState,
    creator: Participant,
) -> Result<Session, ServiceError> {
    ensure_participant(&creator)?;

    let entity = state
        .store()
        .create_session(NewSession::new(creator.into()))
        .await?;
    info!(session_id = %entity.id, creator = %entity.creator_name, "session created");
    Ok(entity.into())
}

/// Read the current state of a session.
pub async fn get_session(state: &SharedState, id: Uuid) -> Result<Session, ServiceError> {
    load_session(state.store().as_ref(), id).await
}

/// Seat `participant` as O in a waiting session.
///
/// When two participants race for the seat, the one whose update lands second
/// re-reads an active session and is rejected as not joinable.
pub async fn join_session(
    state: &SharedState,
    id: Uuid,
    participant: Participant,
) -> Result<Session, ServiceError> {
    ensure_participant(&participant)?;

    let session = update_with(state, id, |session| session.join(participant.clone())).await?;
    info!(session_id = %id, participant = %participant.id, "participant joined");
    Ok(session)
}

/// Place the mark of `actor_id` at `cell`.
pub async fn apply_move(
    state: &SharedState,
    id: Uuid,
    cell: usize,
    actor_id: &str,
) -> Result<Session, ServiceError> {
    let session = update_with(state, id, |session| session.apply_move(cell, actor_id)).await?;
    debug!(
        session_id = %id,
        cell,
        participant = actor_id,
        revision = session.revision,
        "move applied"
    );
    if let Some(outcome) = session.outcome {
        info!(session_id = %id, outcome = ?outcome, "session finished");
    }
    Ok(session)
}

/// Read, validate, then submit the resulting patch guarded on the snapshot read.
///
/// A rejected guard means another writer got there first, so the rules are
/// evaluated again against the fresh document.
async fn update_with<F>(state: &SharedState, id: Uuid, transition: F) -> Result<Session, ServiceError>
where
    F: Fn(&Session) -> Result<SessionPatch, RuleViolation>,
{
    let store: Arc<dyn SessionStore> = state.store();
    let attempts = state.config().max_update_attempts();

    for attempt in 1..=attempts {
        let session = load_session(store.as_ref(), id).await?;
        let patch = transition(&session)?;

        match store.update_session(id, session.guard(), patch).await? {
            UpdateOutcome::Applied(entity) => return Ok(entity.into()),
            UpdateOutcome::Missing => return Err(ServiceError::SessionNotFound(id)),
            UpdateOutcome::Rejected => {
                debug!(
                    session_id = %id,
                    attempt,
                    revision = session.revision,
                    "conditional update rejected; re-reading session"
                );
            }
        }
    }

    warn!(session_id = %id, attempts, "giving up on contended session update");
    Err(ServiceError::Contended { attempts })
}

async fn load_session(store: &dyn SessionStore, id: Uuid) -> Result<Session, ServiceError> {
    store
        .find_session(id)
        .await?
        .map(Session::from)
        .ok_or(ServiceError::SessionNotFound(id))
}

fn ensure_participant(participant: &Participant) -> Result<(), ServiceError> {
    if participant.id.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "participant id must not be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{Guard, SessionEntity, SessionQuery},
            session_store::{MemorySessionStore, SessionChanges},
            storage::StorageResult,
        },
        state::{AppState, board::Mark, session::SessionStatus},
    };

    fn alice() -> Participant {
        Participant::new("alice", "Alice")
    }

    fn bob() -> Participant {
        Participant::new("bob", "Bob")
    }

    fn memory_state() -> SharedState {
        AppState::new(Arc::new(MemorySessionStore::new()), AppConfig::default())
    }

    /// Store whose conditional updates always lose the race.
    #[derive(Clone, Default)]
    struct AlwaysRejecting {
        inner: MemorySessionStore,
    }

    impl SessionStore for AlwaysRejecting {
        fn create_session(&self, session: NewSession) -> BoxFuture<'static, StorageResult<SessionEntity>> {
            self.inner.create_session(session)
        }

        fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
            self.inner.find_session(id)
        }

        fn update_session(
            &self,
            _id: Uuid,
            _guard: Guard,
            _patch: SessionPatch,
        ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
            Box::pin(async { Ok(UpdateOutcome::Rejected) })
        }

        fn list_sessions(&self, query: SessionQuery) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
            self.inner.list_sessions(query)
        }

        fn watch_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<SessionChanges>> {
            self.inner.watch_session(id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
    }

    #[tokio::test]
    async fn create_then_join_activates_session() {
        let state = memory_state();
        let created = create_session(&state, alice()).await.unwrap();
        assert_eq!(created.status, SessionStatus::Waiting);
        assert_eq!(created.creator_name, "Alice");

        let joined = join_session(&state, created.id, bob()).await.unwrap();
        assert_eq!(joined.status, SessionStatus::Active);
        assert_eq!(joined.player_o, Some(bob()));
        assert_eq!(joined.current_turn, Mark::X);
        assert!(joined.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn empty_participant_id_is_invalid_input() {
        let state = memory_state();
        let err = create_session(&state, Participant::new(" ", "Ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = memory_state();
        let id = Uuid::new_v4();
        assert!(matches!(
            get_session(&state, id).await,
            Err(ServiceError::SessionNotFound(missing)) if missing == id
        ));
        assert!(matches!(
            apply_move(&state, id, 0, "alice").await,
            Err(ServiceError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejected_rule_leaves_session_untouched() {
        let state = memory_state();
        let created = create_session(&state, alice()).await.unwrap();
        join_session(&state, created.id, bob()).await.unwrap();

        let err = apply_move(&state, created.id, 0, "bob").await.unwrap_err();
        assert_eq!(err.rule_violation(), Some(&RuleViolation::NotYourTurn));

        let current = get_session(&state, created.id).await.unwrap();
        assert_eq!(current.revision, 2);
        assert!(current.board.is_free(0));
    }

    #[tokio::test]
    async fn persistent_contention_gives_up_after_configured_attempts() {
        let store = AlwaysRejecting::default();
        let state = AppState::new(
            Arc::new(store),
            AppConfig::default().with_max_update_attempts(2),
        );
        let created = create_session(&state, alice()).await.unwrap();

        let err = join_session(&state, created.id, bob()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Contended { attempts: 2 }));
    }
}
