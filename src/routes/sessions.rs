use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{HeaderMap, StatusCode, request::Parts},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::session::{MoveRequest, RoomSummary, SessionView},
    error::AppError,
    services::{directory_service, session_service},
    state::{SharedState, session::Participant},
};

const PARTICIPANT_ID_HEADER: &str = "x-participant-id";
const PARTICIPANT_NAME_HEADER: &str = "x-participant-name";
const ANONYMOUS: &str = "Anonymous";

/// Participant identity carried by the `X-Participant-Id` / `X-Participant-Name` headers.
pub struct Caller(pub Participant);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        participant_from_headers(&parts.headers).map(Caller)
    }
}

fn participant_from_headers(headers: &HeaderMap) -> Result<Participant, AppError> {
    let id = header_value(headers, PARTICIPANT_ID_HEADER).ok_or_else(|| {
        AppError::Unauthorized("missing participant header `X-Participant-Id`".into())
    })?;
    let name = header_value(headers, PARTICIPANT_NAME_HEADER).unwrap_or(ANONYMOUS);
    Ok(Participant::new(id, name))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Routes handling the room lifecycle: create, list, join, play.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/join", post(join_session))
        .route("/sessions/{id}/moves", post(play_move))
}

/// Open a new room with the caller seated as X.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(
        ("X-Participant-Id" = String, Header, description = "Identifier of the calling participant"),
        ("X-Participant-Name" = Option<String>, Header, description = "Display name of the calling participant"),
    ),
    responses(
        (status = 201, description = "Session created", body = SessionView),
        (status = 401, description = "No participant header")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Caller(creator): Caller,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let session = session_service::create_session(&state, creator).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// List rooms waiting for an opponent, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Joinable rooms", body = [RoomSummary])
    )
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<RoomSummary>>, AppError> {
    let rooms = directory_service::list_joinable(&state)
        .await?
        .into_iter()
        .map(RoomSummary::from)
        .collect();
    Ok(Json(rooms))
}

/// Read the current state of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session state", body = SessionView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_service::get_session(&state, id).await?;
    Ok(Json(session.into()))
}

/// Take the O seat of a waiting session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/join",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Participant-Id" = String, Header, description = "Identifier of the calling participant"),
        ("X-Participant-Name" = Option<String>, Header, description = "Display name of the calling participant"),
    ),
    responses(
        (status = 200, description = "Seat taken", body = SessionView),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session already full or finished")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Caller(participant): Caller,
) -> Result<Json<SessionView>, AppError> {
    let session = session_service::join_session(&state, id, participant).await?;
    Ok(Json(session.into()))
}

/// Place the caller's mark on a cell.
#[utoipa::path(
    post,
    path = "/sessions/{id}/moves",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Participant-Id" = String, Header, description = "Identifier of the calling participant"),
    ),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Move applied", body = SessionView),
        (status = 400, description = "Cell outside the board"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Not your turn, cell taken or game not active")
    )
)]
pub async fn play_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Caller(actor): Caller,
    Json(payload): Json<MoveRequest>,
) -> Result<Json<SessionView>, AppError> {
    payload.validate()?;
    let session = session_service::apply_move(&state, id, payload.cell, &actor.id).await?;
    Ok(Json(session.into()))
}
