use std::time::Duration;

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{Guard, ParticipantEntity, SessionEntity},
    state::{
        board::{Board, Mark},
        session::{Outcome, SessionStatus},
    },
};

use super::error::MongoDaoError;

/// Precision of BSON dates; store timestamps must not be finer than this.
pub const TIMESTAMP_RESOLUTION: Duration = Duration::from_millis(1);

/// Session as stored in the `sessions` collection. `_id` is the hyphenated UUID string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    board: Board,
    current_turn: Mark,
    player_x: Option<ParticipantEntity>,
    player_o: Option<ParticipantEntity>,
    status: SessionStatus,
    outcome: Option<Outcome>,
    creator_name: String,
    created_at: DateTime,
    updated_at: DateTime,
    revision: i64,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            board: value.board,
            current_turn: value.current_turn,
            player_x: value.player_x,
            player_o: value.player_o,
            status: value.status,
            outcome: value.outcome,
            creator_name: value.creator_name,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            revision: revision_to_bson(value.revision),
        }
    }
}

impl TryFrom<MongoSessionDocument> for SessionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSessionDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id)
            .map_err(|_| MongoDaoError::InvalidId { value: value.id.clone() })?;
        let revision = u64::try_from(value.revision).map_err(|_| MongoDaoError::InvalidRevision {
            id,
            value: value.revision,
        })?;
        Ok(Self {
            id,
            board: value.board,
            current_turn: value.current_turn,
            player_x: value.player_x,
            player_o: value.player_o,
            status: value.status,
            outcome: value.outcome,
            creator_name: value.creator_name,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            revision,
        })
    }
}

fn revision_to_bson(revision: u64) -> i64 {
    i64::try_from(revision).unwrap_or(i64::MAX)
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching the document only while it still satisfies `guard`.
pub fn guarded(id: Uuid, guard: Guard) -> Document {
    doc! {
        "_id": id.to_string(),
        "revision": revision_to_bson(guard.revision),
        "status": guard.status.as_str(),
    }
}
