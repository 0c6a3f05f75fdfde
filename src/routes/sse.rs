use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::{session_feed, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sessions/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Session state stream: `session` events, then `session.gone` if it disappears", content_type = "text/event-stream", body = String))
)]
/// Stream every state of one session to the client.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let feed = session_feed::watch_session(&state, id).await?;
    info!(session_id = %id, "new session SSE connection");
    let config = state.config();
    Ok(sse_service::to_sse_stream(
        id,
        feed,
        config.feed_capacity(),
        config.sse_keep_alive(),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{id}/events", get(session_stream))
}
