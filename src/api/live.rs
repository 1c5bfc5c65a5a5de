//! Server-Sent Events for live snapshots

use std::time::Duration;

use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use futures::Stream;
use futures::StreamExt;
use serde::Serialize;

/// Seconds between keep-alive comments on an idle stream
const KEEP_ALIVE_INTERVAL: u64 = 15;

/// Send every snapshot as an event with the given name
///
/// Each event carries the full list as JSON. When the client goes away the stream is dropped,
/// which ends the underlying subscription.
pub fn snapshot_events<T, St>(
    name: &'static str,
    snapshots: St,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>>
where
    T: Serialize,
    St: Stream<Item = Vec<T>> + Send + 'static,
{
    let events = snapshots.map(move |snapshot| Event::default().event(name).json_data(snapshot));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_INTERVAL))
            .text("keep-alive"),
    )
}
