//! Identity of the participant driving a [`RoomClient`](crate::client::RoomClient).
//!
//! The provider is a collaborator: sign-in flows live outside this crate, only the
//! resulting user, change notifications and sign-out are consumed here.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::info;

use crate::state::{
    listener::{ListenerSlot, Subscription},
    session::Participant,
};

const ANONYMOUS: &str = "Anonymous";

/// Signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Seat identity: the display name, else the e-mail address, else `Anonymous`.
    pub fn participant(&self) -> Participant {
        let name = [self.display_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| !candidate.is_empty())
            .unwrap_or(ANONYMOUS);
        Participant::new(self.uid.clone(), name)
    }
}

/// Failures reported by an auth provider.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("sign-out failed: {0}")]
    SignOut(String),
}

/// Auth collaborator consumed by the room client.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;

    /// Register `listener`; it is called with the current participant right away
    /// and again on every sign-in or sign-out.
    fn on_auth_change(&self, listener: Box<dyn FnMut(Option<Participant>) + Send>) -> Subscription;

    fn sign_out(&self) -> BoxFuture<'static, Result<(), AuthError>>;

    fn current_participant(&self) -> Option<Participant> {
        self.current_user().map(|user| user.participant())
    }
}

type AuthSlot = Arc<ListenerSlot<Option<Participant>>>;

/// In-process provider: whoever calls [`LocalAuth::sign_in`] is the current user.
#[derive(Clone, Default)]
pub struct LocalAuth {
    inner: Arc<LocalAuthInner>,
}

#[derive(Default)]
struct LocalAuthInner {
    user: Mutex<Option<AuthUser>>,
    listeners: Mutex<Vec<AuthSlot>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider with `user` already signed in.
    pub fn signed_in(user: AuthUser) -> Self {
        let auth = Self::new();
        auth.sign_in(user);
        auth
    }

    pub fn sign_in(&self, user: AuthUser) {
        info!(uid = %user.uid, "user signed in");
        self.replace(Some(user));
    }

    fn replace(&self, user: Option<AuthUser>) {
        let participant = user.as_ref().map(AuthUser::participant);
        *self.inner.user.lock().unwrap_or_else(PoisonError::into_inner) = user;

        // notify outside the registry lock so listeners may (un)subscribe
        let listeners = {
            let mut guard = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.retain(|slot| !slot.is_closed());
            guard.clone()
        };
        for slot in listeners {
            slot.notify(participant.clone());
        }
    }
}

impl AuthProvider for LocalAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.inner
            .user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn on_auth_change(&self, listener: Box<dyn FnMut(Option<Participant>) + Send>) -> Subscription {
        let slot = ListenerSlot::new(listener);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(slot.clone());
        slot.notify(self.current_participant());
        Subscription::new(slot)
    }

    fn sign_out(&self) -> BoxFuture<'static, Result<(), AuthError>> {
        let auth = self.clone();
        Box::pin(async move {
            if let Some(user) = auth.current_user() {
                info!(uid = %user.uid, "user signed out");
            }
            auth.replace(None);
            Ok(())
        })
    }
}
