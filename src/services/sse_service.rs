use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        session::SessionView,
        sse::{SESSION_EVENT, SESSION_GONE_EVENT, ServerEvent},
    },
    services::session_feed::SessionFeed,
    state::session::Session,
};

/// Convert a session feed into an SSE response, forwarding every state and
/// stopping once the client disconnects or the session disappears.
pub fn to_sse_stream(
    session_id: Uuid,
    mut feed: SessionFeed,
    capacity: usize,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(capacity);

    // forwarder task: drains the feed and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                change = feed.next() => {
                    let Some(change) = change else {
                        break;
                    };
                    let (payload, last) = match change {
                        Ok(Some(session)) => (session_event(session), false),
                        Ok(None) => (Some(ServerEvent::new(Some(SESSION_GONE_EVENT.to_string()), session_id.to_string())), true),
                        Err(err) => {
                            warn!(session_id = %session_id, error = %err, "session feed failed; closing SSE stream");
                            break;
                        }
                    };

                    if let Some(payload) = payload {
                        if tx.send(Ok(to_event(payload))).await.is_err() {
                            break;
                        }
                    }
                    if last {
                        break;
                    }
                }
            }
        }

        info!(session_id = %session_id, "session SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}

fn session_event(session: Session) -> Option<ServerEvent> {
    let id = session.id;
    match ServerEvent::json(Some(SESSION_EVENT.to_string()), &SessionView::from(session)) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(session_id = %id, error = %err, "failed to serialise session event");
            None
        }
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
