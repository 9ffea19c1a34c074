use crate::{error::Result, models::event::Event, state::AppState};
use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(publish_event))
}

/// 接收外部服务发布的事件并投递给消费者
async fn publish_event(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<(StatusCode, Json<Value>)> {
    let event = Event::from_json(&body)?;
    let event_id = event.event_id;
    let event_type = event.event_type();
    tracing::debug!("Received event {} ({})", event_id, event_type);

    state.publisher.publish(event).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "data": {
                "eventId": event_id,
                "type": event_type,
            }
        })),
    ))
}
