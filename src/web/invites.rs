use crate::services::mailer::InviteRecipient;
use crate::state::SharedState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/send-invites", post(send_invites))
        .with_state(state)
}

/// Batch invite delivery. The call succeeds as long as the body is
/// well-formed; individual delivery failures only appear in the results
/// array. The body is inspected as raw JSON so a missing or non-array
/// `invites` field maps to a 400 instead of an extractor rejection.
async fn send_invites(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let Some(invites) = body.get("invites").and_then(Value::as_array) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid invites data" })),
        )
            .into_response();
    };

    // Malformed entries degrade to empty fields, which the mailer reports as
    // per-recipient errors rather than failing the batch.
    let recipients: Vec<InviteRecipient> = invites
        .iter()
        .map(|entry| serde_json::from_value(entry.clone()).unwrap_or_default())
        .collect();

    tracing::info!("Dispatching {} invite emails", recipients.len());
    let results = state.mailer.send_invites(recipients).await;

    (StatusCode::OK, Json(json!({ "results": results }))).into_response()
}
