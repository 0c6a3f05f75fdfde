use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, SessionEntity},
    state::{
        board::{Board, Mark},
        session::{Outcome, SessionStatus},
    },
};

use super::error::CouchDaoError;

pub const SESSION_PREFIX: &str = "session::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Body of a `PUT /{db}/{doc_id}` answer.
#[derive(Debug, Deserialize)]
pub struct PutResponse {
    pub rev: String,
}

/// Body of a `_changes` answer.
#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: SessionBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBody {
    pub board: Board,
    pub current_turn: Mark,
    pub player_x: Option<ParticipantEntity>,
    pub player_o: Option<ParticipantEntity>,
    pub status: SessionStatus,
    pub outcome: Option<Outcome>,
    pub creator_name: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub revision: u64,
}

impl From<(SessionEntity, Option<String>)> for CouchSessionDocument {
    fn from((session, rev): (SessionEntity, Option<String>)) -> Self {
        Self {
            id: session_doc_id(session.id),
            rev,
            session: SessionBody {
                board: session.board,
                current_turn: session.current_turn,
                player_x: session.player_x,
                player_o: session.player_o,
                status: session.status,
                outcome: session.outcome,
                creator_name: session.creator_name,
                created_at: session.created_at,
                updated_at: session.updated_at,
                revision: session.revision,
            },
        }
    }
}

impl TryFrom<CouchSessionDocument> for SessionEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchSessionDocument) -> Result<Self, Self::Error> {
        let id = extract_uuid(&doc.id)?;
        let body = doc.session;
        Ok(SessionEntity {
            id,
            board: body.board,
            current_turn: body.current_turn,
            player_x: body.player_x,
            player_o: body.player_o,
            status: body.status,
            outcome: body.outcome,
            creator_name: body.creator_name,
            created_at: body.created_at,
            updated_at: body.updated_at,
            revision: body.revision,
        })
    }
}

pub fn session_doc_id(id: Uuid) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let id = doc_id
        .strip_prefix(SESSION_PREFIX)
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing session prefix",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid UUID",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::NewSession;

    #[test]
    fn document_round_trips_through_couch_layout() {
        let entity = NewSession::new(ParticipantEntity {
            id: "alice".into(),
            name: "Alice".into(),
        })
        .into_entity(Uuid::new_v4(), SystemTime::now());

        let doc = CouchSessionDocument::from((entity.clone(), Some("1-abc".into())));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], format!("session::{}", entity.id));
        assert_eq!(json["_rev"], "1-abc");
        assert_eq!(json["status"], "waiting");

        let parsed: CouchSessionDocument = serde_json::from_value(json).unwrap();
        assert_eq!(SessionEntity::try_from(parsed).unwrap(), entity);
    }

    #[test]
    fn foreign_document_ids_are_rejected() {
        assert!(extract_uuid("game::not-a-session").is_err());
        assert!(extract_uuid("session::not-a-uuid").is_err());
    }
}
