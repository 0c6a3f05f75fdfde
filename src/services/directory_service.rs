use tracing::debug;

use crate::{
    dao::models::SessionQuery,
    error::ServiceError,
    state::{SharedState, session::Session},
};

/// Sessions still waiting for a second participant, newest first.
///
/// This is a plain read: a listed room may already be claimed by the time it is joined.
pub async fn list_joinable(state: &SharedState) -> Result<Vec<Session>, ServiceError> {
    let sessions = state
        .store()
        .list_sessions(SessionQuery::waiting())
        .await?
        .into_iter()
        .map(Session::from)
        .collect::<Vec<_>>();
    debug!(count = sessions.len(), "listed joinable sessions");
    Ok(sessions)
}
