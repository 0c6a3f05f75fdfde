//! Per-participant entry point to online play: the lobby and game flows on top of
//! the session services, with the identity taken from an [`AuthProvider`].

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    auth::{AuthError, AuthProvider},
    error::ServiceError,
    services::{directory_service, session_feed, session_service},
    state::{
        SharedState,
        board::Mark,
        listener::Subscription,
        session::{Participant, Session, SessionStatus},
    },
};

#[derive(Clone)]
pub struct RoomClient {
    state: SharedState,
    auth: Arc<dyn AuthProvider>,
}

impl RoomClient {
    pub fn new(state: SharedState, auth: Arc<dyn AuthProvider>) -> Self {
        Self { state, auth }
    }

    /// Open a room seated as X. Requires a signed-in user.
    pub async fn create_room(&self) -> Result<Session, ServiceError> {
        let creator = self.signed_in("create a room")?;
        session_service::create_session(&self.state, creator).await
    }

    /// Take the O seat of a waiting room. Requires a signed-in user.
    pub async fn join_room(&self, id: Uuid) -> Result<Session, ServiceError> {
        let participant = self.signed_in("join a room")?;
        session_service::join_session(&self.state, id, participant).await
    }

    pub async fn play(&self, id: Uuid, cell: usize) -> Result<Session, ServiceError> {
        let actor = self.signed_in("make a move")?;
        session_service::apply_move(&self.state, id, cell, &actor.id).await
    }

    pub async fn room(&self, id: Uuid) -> Result<Session, ServiceError> {
        session_service::get_session(&self.state, id).await
    }

    /// Joinable rooms, newest first.
    pub async fn rooms(&self) -> Result<Vec<Session>, ServiceError> {
        directory_service::list_joinable(&self.state).await
    }

    /// Follow a room; see [`session_feed::subscribe`].
    pub fn watch<F>(&self, id: Uuid, listener: F) -> Subscription
    where
        F: FnMut(Option<Session>) + Send + 'static,
    {
        session_feed::subscribe(&self.state, id, listener)
    }

    /// Mark held by the signed-in user in `session`.
    pub fn seat(&self, session: &Session) -> Option<Mark> {
        let participant = self.auth.current_participant()?;
        session.seat_of(&participant.id)
    }

    /// Whether the signed-in user is expected to move in `session`.
    pub fn is_my_turn(&self, session: &Session) -> bool {
        if session.status != SessionStatus::Active {
            return false;
        }
        let Some(participant) = self.auth.current_participant() else {
            return false;
        };
        session
            .participant_for(session.current_turn)
            .is_some_and(|seated| seated.id == participant.id)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth.sign_out().await
    }

    fn signed_in(&self, action: &str) -> Result<Participant, ServiceError> {
        self.auth
            .current_participant()
            .ok_or_else(|| ServiceError::Unauthorized(format!("you must be logged in to {action}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AuthUser, LocalAuth},
        config::AppConfig,
        dao::session_store::MemorySessionStore,
        state::AppState,
    };

    fn state() -> SharedState {
        AppState::new(Arc::new(MemorySessionStore::new()), AppConfig::default())
    }

    fn client(state: &SharedState, auth: &LocalAuth) -> RoomClient {
        RoomClient::new(state.clone(), Arc::new(auth.clone()))
    }

    #[tokio::test]
    async fn signed_out_user_cannot_create_or_join() {
        let state = state();
        let auth = LocalAuth::new();
        let client = client(&state, &auth);

        let err = client.create_room().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "unauthorized: you must be logged in to create a room"
        );
        let err = client.join_room(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "unauthorized: you must be logged in to join a room"
        );
    }

    #[tokio::test]
    async fn two_clients_play_through_a_room() {
        let state = state();
        let alice_auth = LocalAuth::signed_in(AuthUser::new("alice").with_email("alice@example.com"));
        let bob_auth = LocalAuth::signed_in(AuthUser::new("bob").with_display_name("Bob"));
        let alice = client(&state, &alice_auth);
        let bob = client(&state, &bob_auth);

        let room = alice.create_room().await.unwrap();
        assert_eq!(room.creator_name, "alice@example.com");
        assert_eq!(bob.rooms().await.unwrap().len(), 1);

        let room = bob.join_room(room.id).await.unwrap();
        assert_eq!(alice.seat(&room), Some(Mark::X));
        assert_eq!(bob.seat(&room), Some(Mark::O));
        assert!(alice.is_my_turn(&room));
        assert!(!bob.is_my_turn(&room));
        assert!(bob.rooms().await.unwrap().is_empty());

        let room = alice.play(room.id, 4).await.unwrap();
        assert!(bob.is_my_turn(&room));

        bob.sign_out().await.unwrap();
        assert!(!bob.is_my_turn(&room));
        assert_eq!(bob.seat(&room), None);
    }
}
