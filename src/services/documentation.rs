use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the tic-tac-toe backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::list_sessions,
        crate::routes::sessions::get_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::play_move,
        crate::routes::sse::session_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionView,
            crate::dto::session::RoomSummary,
            crate::dto::session::ParticipantView,
            crate::dto::session::MoveRequest,
            crate::state::board::Mark,
            crate::state::session::SessionStatus,
            crate::state::session::Outcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Game rooms: create, join, play"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
