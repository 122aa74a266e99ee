// rest/sse.rs — SSE bridge for the household event stream.
//
// GET /api/v1/households/{id}/events
//
// Long-lived stream of tagged domain events. Membership is checked before
// the connection registers with the broker; the per-user connection cap is
// enforced by the broker itself. A keep-alive `ping` rides the transport on
// a configurable interval, and a drop-guard deregisters the connection as
// soon as the client goes away.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::access::{self, Role};
use crate::events::{EventBroker, SubscribeError};
use crate::rest::auth::Identity;
use crate::AppContext;

/// Deregisters the connection when the SSE stream is dropped — client
/// disconnects unsubscribe promptly instead of waiting for a failed send.
struct StreamGuard {
    broker: Arc<EventBroker>,
    household_id: String,
    connection_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.broker.unsubscribe(&self.household_id, &self.connection_id);
    }
}

pub async fn household_events_sse(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
) -> Response {
    if let Err(e) =
        access::authorize(&ctx.storage.pool(), &identity.user_id, &household_id, Role::Member)
            .await
    {
        return e.into_response();
    }

    let subscription = match ctx.broker.subscribe(&household_id, &identity.user_id) {
        Ok(s) => s,
        Err(SubscribeError::RateLimited { active }) => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "too many simultaneous event streams",
                    "code": "rate_limited",
                    "active": active,
                })),
            )
                .into_response();
        }
    };

    let guard = StreamGuard {
        broker: Arc::clone(&ctx.broker),
        household_id,
        connection_id: subscription.connection_id.clone(),
    };

    let stream = UnboundedReceiverStream::new(subscription.rx).map(move |event| {
        // The guard lives inside the stream closure; dropping the stream
        // drops it and unsubscribes.
        let _ = &guard;
        Ok::<Event, Infallible>(
            Event::default()
                .event(event.kind())
                .data(serde_json::to_string(&event).unwrap_or_default()),
        )
    });

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(ctx.config.stream.heartbeat_secs))
                .text("ping"),
        )
        .into_response()
}
