use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::{
        board::Mark,
        session::{Outcome, Participant, Session, SessionStatus},
    },
};

/// Seated participant as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ParticipantView {
    pub id: String,
    pub name: String,
}

impl From<Participant> for ParticipantView {
    fn from(value: Participant) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

/// Full state of a session, sent by the REST routes and the SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    /// Nine cells in row-major order; `null` for empty.
    pub board: Vec<Option<Mark>>,
    pub current_turn: Mark,
    pub player_x: Option<ParticipantView>,
    pub player_o: Option<ParticipantView>,
    pub status: SessionStatus,
    pub outcome: Option<Outcome>,
    pub creator_name: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
    /// Increases on every applied update; clients can drop older snapshots.
    pub revision: u64,
    /// Status line for display, e.g. `Winner: Alice`.
    pub message: String,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        let message = session.status_message();
        Self {
            id: session.id,
            board: session.board.cells().to_vec(),
            current_turn: session.current_turn,
            player_x: session.player_x.map(Into::into),
            player_o: session.player_o.map(Into::into),
            status: session.status,
            outcome: session.outcome,
            creator_name: session.creator_name,
            created_at: format_system_time(session.created_at),
            updated_at: format_system_time(session.updated_at),
            revision: session.revision,
            message,
        }
    }
}

/// Lobby entry for a room waiting for an opponent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomSummary {
    pub id: Uuid,
    pub creator_name: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<Session> for RoomSummary {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            creator_name: session.creator_name,
            created_at: format_system_time(session.created_at),
        }
    }
}

/// Body of `POST /sessions/{id}/moves`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct MoveRequest {
    /// Cell index in row-major order.
    #[validate(range(max = 8))]
    #[schema(minimum = 0, maximum = 8)]
    pub cell: usize,
}
