//! Lifecycle of a shared tic-tac-toe session: `Waiting -> Active -> Finished`.
//!
//! Transitions are computed here as pure functions returning a [`SessionPatch`];
//! the service layer submits the patch to the store as a single guarded update.

use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{Guard, ParticipantEntity, SessionEntity, SessionPatch},
    state::{
        board::{Board, Mark},
        rules::{Progress, RuleViolation, play_cell},
    },
};

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, waiting for a second participant.
    Waiting,
    /// Both seats taken, moves accepted.
    Active,
    /// Won or drawn; no further moves.
    Finished,
}

impl SessionStatus {
    /// Lowercase label used in messages and storage queries.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// X completed a line.
    WinnerX,
    /// O completed a line.
    WinnerO,
    /// Board filled without a line.
    Draw,
}

impl Outcome {
    /// Outcome crediting `mark` with the win.
    pub fn winner(mark: Mark) -> Self {
        match mark {
            Mark::X => Outcome::WinnerX,
            Mark::O => Outcome::WinnerO,
        }
    }

    /// Winning mark, `None` for a draw.
    pub fn winning_mark(self) -> Option<Mark> {
        match self {
            Outcome::WinnerX => Some(Mark::X),
            Outcome::WinnerO => Some(Mark::O),
            Outcome::Draw => None,
        }
    }
}

/// An authenticated actor taking a seat in a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    /// Opaque identifier issued by the auth provider.
    pub id: String,
    /// Name shown to other participants.
    pub name: String,
}

impl Participant {
    /// Build a participant from its identifier and display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Authoritative state of one shared match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Identifier assigned by the store.
    pub id: Uuid,
    /// Current board.
    pub board: Board,
    /// Mark expected to move next.
    pub current_turn: Mark,
    /// Creator, always seated as X.
    pub player_x: Option<Participant>,
    /// Joiner, absent while waiting.
    pub player_o: Option<Participant>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Set once finished.
    pub outcome: Option<Outcome>,
    /// Display name of the creator, shown in the room list.
    pub creator_name: String,
    /// Store-assigned creation time.
    pub created_at: SystemTime,
    /// Store-assigned time of the last applied update.
    pub updated_at: SystemTime,
    /// Store-assigned counter, bumped on every applied update.
    pub revision: u64,
}

impl Session {
    /// Participant seated on `mark`, if any.
    pub fn participant_for(&self, mark: Mark) -> Option<&Participant> {
        match mark {
            Mark::X => self.player_x.as_ref(),
            Mark::O => self.player_o.as_ref(),
        }
    }

    /// Mark held by `participant_id`. X wins the tie when one participant holds both seats.
    pub fn seat_of(&self, participant_id: &str) -> Option<Mark> {
        [Mark::X, Mark::O].into_iter().find(|mark| {
            self.participant_for(*mark)
                .is_some_and(|participant| participant.id == participant_id)
        })
    }

    /// Guard describing the snapshot a transition was computed from.
    pub fn guard(&self) -> Guard {
        Guard {
            revision: self.revision,
            status: self.status,
        }
    }

    /// Seat `participant` as O and activate the session.
    pub fn join(&self, participant: Participant) -> Result<SessionPatch, RuleViolation> {
        if self.status != SessionStatus::Waiting {
            return Err(RuleViolation::NotJoinable {
                status: self.status,
            });
        }

        Ok(SessionPatch {
            board: self.board,
            current_turn: self.current_turn,
            player_o: Some(participant.into()),
            status: SessionStatus::Active,
            outcome: None,
        })
    }

    /// Place the current mark at `cell` on behalf of `actor_id`.
    ///
    /// Checks run in order: status, cell range, occupancy, turn ownership.
    pub fn apply_move(&self, cell: usize, actor_id: &str) -> Result<SessionPatch, RuleViolation> {
        if self.status != SessionStatus::Active {
            return Err(RuleViolation::GameNotActive {
                status: self.status,
            });
        }

        let (board, progress) = play_cell(&self.board, cell, self.current_turn)?;

        let owns_turn = self
            .participant_for(self.current_turn)
            .is_some_and(|participant| participant.id == actor_id);
        if !owns_turn {
            return Err(RuleViolation::NotYourTurn);
        }

        let player_o = self.player_o.clone().map(Into::into);
        let patch = match progress {
            Progress::Continue { next } => SessionPatch {
                board,
                current_turn: next,
                player_o,
                status: SessionStatus::Active,
                outcome: None,
            },
            Progress::Finished(outcome) => SessionPatch {
                board,
                current_turn: self.current_turn,
                player_o,
                status: SessionStatus::Finished,
                outcome: Some(outcome),
            },
        };

        Ok(patch)
    }

    /// Human readable status line for participants watching the session.
    pub fn status_message(&self) -> String {
        match (self.status, self.outcome) {
            (SessionStatus::Waiting, _) => "Waiting for another player to join...".into(),
            (SessionStatus::Active, _) => String::new(),
            (SessionStatus::Finished, Some(Outcome::Draw)) => "It's a draw!".into(),
            (SessionStatus::Finished, Some(outcome)) => {
                let Some(mark) = outcome.winning_mark() else {
                    return "It's a draw!".into();
                };
                let name = self
                    .participant_for(mark)
                    .map(|participant| participant.name.clone())
                    .unwrap_or_else(|| format!("Player {mark}"));
                format!("Winner: {name}")
            }
            (SessionStatus::Finished, None) => "Game over".into(),
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<SessionEntity> for Session {
    fn from(entity: SessionEntity) -> Self {
        Self {
            id: entity.id,
            board: entity.board,
            current_turn: entity.current_turn,
            player_x: entity.player_x.map(Into::into),
            player_o: entity.player_o.map(Into::into),
            status: entity.status,
            outcome: entity.outcome,
            creator_name: entity.creator_name,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            revision: entity.revision,
        }
    }
}

impl From<Session> for SessionEntity {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            board: session.board,
            current_turn: session.current_turn,
            player_x: session.player_x.map(Into::into),
            player_o: session.player_o.map(Into::into),
            status: session.status,
            outcome: session.outcome,
            creator_name: session.creator_name,
            created_at: session.created_at,
            updated_at: session.updated_at,
            revision: session.revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::NewSession;

    fn alice() -> Participant {
        Participant::new("alice", "Alice")
    }

    fn bob() -> Participant {
        Participant::new("bob", "Bob")
    }

    fn waiting() -> Session {
        NewSession::new(alice().into())
            .into_entity(Uuid::new_v4(), SystemTime::now())
            .into()
    }

    fn commit(session: &Session, patch: SessionPatch) -> Session {
        let mut entity = SessionEntity::from(session.clone());
        patch.apply(&mut entity, SystemTime::now());
        entity.into()
    }

    fn active() -> Session {
        let session = waiting();
        let patch = session.join(bob()).unwrap();
        commit(&session, patch)
    }

    #[test]
    fn new_session_waits_with_creator_as_x() {
        let session = waiting();
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.player_x, Some(alice()));
        assert_eq!(session.player_o, None);
        assert_eq!(session.current_turn, Mark::X);
        assert_eq!(session.board, Board::new());
        assert_eq!(session.outcome, None);
        assert_eq!(session.revision, 1);
    }

    #[test]
    fn join_activates_waiting_session() {
        let session = active();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.player_o, Some(bob()));
        assert_eq!(session.revision, 2);
    }

    #[test]
    fn join_is_rejected_once_active() {
        let session = active();
        let err = session
            .join(Participant::new("carol", "Carol"))
            .unwrap_err();
        assert_eq!(
            err,
            RuleViolation::NotJoinable {
                status: SessionStatus::Active
            }
        );
        assert_eq!(err.to_string(), "session is already full or finished");
    }

    #[test]
    fn moves_on_waiting_session_are_rejected() {
        let err = waiting().apply_move(0, "alice").unwrap_err();
        assert_eq!(
            err,
            RuleViolation::GameNotActive {
                status: SessionStatus::Waiting
            }
        );
    }

    #[test]
    fn wrong_participant_cannot_move() {
        let err = active().apply_move(0, "bob").unwrap_err();
        assert_eq!(err, RuleViolation::NotYourTurn);
    }

    #[test]
    fn occupancy_is_checked_before_turn_ownership() {
        let session = active();
        let session = commit(&session, session.apply_move(0, "alice").unwrap());
        let err = session.apply_move(0, "alice").unwrap_err();
        assert_eq!(err, RuleViolation::CellOccupied { cell: 0 });
    }

    #[test]
    fn winning_move_finishes_without_flipping_turn() {
        let mut session = active();
        for (cell, actor) in [(0, "alice"), (4, "bob"), (1, "alice"), (7, "bob")] {
            session = commit(&session, session.apply_move(cell, actor).unwrap());
        }
        let patch = session.apply_move(2, "alice").unwrap();
        assert_eq!(patch.status, SessionStatus::Finished);
        assert_eq!(patch.outcome, Some(Outcome::WinnerX));
        assert_eq!(patch.current_turn, Mark::X);

        let finished = commit(&session, patch);
        assert_eq!(finished.status_message(), "Winner: Alice");
        assert_eq!(
            finished.apply_move(8, "bob").unwrap_err(),
            RuleViolation::GameNotActive {
                status: SessionStatus::Finished
            }
        );
    }

    #[test]
    fn seat_lookup_matches_participants() {
        let session = active();
        assert_eq!(session.seat_of("alice"), Some(Mark::X));
        assert_eq!(session.seat_of("bob"), Some(Mark::O));
        assert_eq!(session.seat_of("mallory"), None);
    }

    #[test]
    fn status_messages_follow_lifecycle() {
        assert_eq!(
            waiting().status_message(),
            "Waiting for another player to join..."
        );
        assert_eq!(active().status_message(), "");
    }
}
