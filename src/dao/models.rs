use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    board::{Board, Mark},
    session::{Outcome, SessionStatus},
};

/// Participant seated in a session, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Identifier issued by the auth provider.
    pub id: String,
    /// Display name at the time the seat was taken.
    pub name: String,
}

/// Session document persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key, assigned by the store.
    pub id: Uuid,
    /// Cells in row-major order.
    pub board: Board,
    /// Mark expected to move next.
    pub current_turn: Mark,
    /// Creator seat.
    pub player_x: Option<ParticipantEntity>,
    /// Joiner seat, empty while waiting.
    pub player_o: Option<ParticipantEntity>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Result once finished.
    pub outcome: Option<Outcome>,
    /// Creator display name, denormalised for the room list.
    pub creator_name: String,
    /// Creation timestamp assigned by the store.
    pub created_at: SystemTime,
    /// Last update timestamp assigned by the store.
    pub updated_at: SystemTime,
    /// Update counter, 1 at creation.
    pub revision: u64,
}

/// Fields supplied by the caller when creating a session; the store fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    /// Participant opening the room, seated as X.
    pub creator: ParticipantEntity,
}

impl NewSession {
    /// Describe a fresh waiting session opened by `creator`.
    pub fn new(creator: ParticipantEntity) -> Self {
        Self { creator }
    }

    /// Materialise the document with store-assigned identity and timestamps.
    pub fn into_entity(self, id: Uuid, now: SystemTime) -> SessionEntity {
        SessionEntity {
            id,
            board: Board::new(),
            current_turn: Mark::X,
            creator_name: self.creator.name.clone(),
            player_x: Some(self.creator),
            player_o: None,
            status: SessionStatus::Waiting,
            outcome: None,
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }
}

/// Mutable part of a session replaced by a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPatch {
    /// Board after the transition.
    pub board: Board,
    /// Mark to move after the transition.
    pub current_turn: Mark,
    /// Joiner seat after the transition.
    pub player_o: Option<ParticipantEntity>,
    /// Status after the transition.
    pub status: SessionStatus,
    /// Outcome after the transition.
    pub outcome: Option<Outcome>,
}

impl SessionPatch {
    /// Write the patch into `entity`, bumping its revision and update timestamp.
    pub fn apply(self, entity: &mut SessionEntity, now: SystemTime) {
        entity.board = self.board;
        entity.current_turn = self.current_turn;
        entity.player_o = self.player_o;
        entity.status = self.status;
        entity.outcome = self.outcome;
        entity.updated_at = now;
        entity.revision += 1;
    }
}

/// Precondition of a conditional update: the document must still be at the
/// snapshot the patch was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    /// Revision the patch was computed from.
    pub revision: u64,
    /// Status the patch was computed from.
    pub status: SessionStatus,
}

impl Guard {
    /// Whether `entity` still satisfies the guard.
    pub fn admits(&self, entity: &SessionEntity) -> bool {
        entity.revision == self.revision && entity.status == self.status
    }
}

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The guard held and the patch was written; carries the new document.
    Applied(SessionEntity),
    /// The document changed since the guard was taken; nothing was written.
    Rejected,
    /// No document with that id exists.
    Missing,
}

/// Filter for session listings. Results are always newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionQuery {
    /// Restrict to a single status.
    pub status: Option<SessionStatus>,
}

impl SessionQuery {
    /// Sessions still waiting for a second participant.
    pub fn waiting() -> Self {
        Self {
            status: Some(SessionStatus::Waiting),
        }
    }

    /// Whether `entity` passes the filter.
    pub fn matches(&self, entity: &SessionEntity) -> bool {
        self.status.is_none_or(|status| entity.status == status)
    }
}

/// Order sessions by creation time, newest first. Ties break on id so listings are stable.
pub fn sort_newest_first(sessions: &mut [SessionEntity]) {
    sessions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
