use crate::render;
use crate::sse::models::EventCategory;
use crate::startup::AppState;
use axum::{
    extract::{ConnectInfo, Extension},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::{convert::Infallible, net::SocketAddr};
use tracing::{info, warn};

/// Long-lived event stream for one viewer.
///
/// The viewer first gets the current bar, then every `vote`, `question` and
/// `deleteQuestion` event published while it stays connected. When the
/// client goes away axum drops the stream, and the subscription with it.
pub async fn live_stream(
    Extension(app_state): Extension<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // Subscribe before reading the snapshot so no update falls in between.
    let mut subscription = app_state.broadcaster.subscribe();
    info!(viewer = %peer, subscription = %subscription.id(), "viewer connected");

    let aggregator = app_state.aggregator.clone();

    let stream = async_stream::stream! {
        match aggregator.aggregate().await {
            Ok(state) => {
                yield Ok(Event::default()
                    .event(EventCategory::Vote.as_str())
                    .data(render::bar(&state)));
            }
            Err(e) => {
                warn!(viewer = %peer, "Failed to load snapshot: {}", e);
            }
        }

        while let Ok(message) = subscription.recv().await {
            yield Ok(message.to_event());
        }

        info!(viewer = %peer, "live stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(app_state.config.keep_alive)
            .text("keep-alive"),
    )
}
