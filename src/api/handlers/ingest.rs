use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ingest::{FailureReason, IngestOutcome};
use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use serde_json::Value;

fn status_for(outcome: &IngestOutcome) -> StatusCode {
    match outcome {
        IngestOutcome::Success { .. } | IngestOutcome::Duplicate { .. } => StatusCode::OK,
        IngestOutcome::Error { reason, .. } => match reason {
            FailureReason::InvalidPayload => StatusCode::BAD_REQUEST,
            FailureReason::Upstream => StatusCode::BAD_GATEWAY,
            FailureReason::Storage | FailureReason::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

/// Store a snapshot pushed by the caller instead of fetched from the feed.
pub async fn ingest_payload(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestOutcome>)> {
    let payload = match serde_json::from_slice::<Value>(&body)? {
        Value::Object(map) => map,
        _ => {
            return Err(AppError::InvalidPayload(
                "payload must be a JSON object".into(),
            ))
        }
    };

    let outcome = state.pipeline.ingestor().ingest(&payload).await;
    Ok((status_for(&outcome), Json(outcome)))
}

/// Fetch and store one snapshot now, alongside the scheduled loop.
pub async fn run_once(State(state): State<AppState>) -> (StatusCode, Json<IngestOutcome>) {
    let outcome = state.scheduler.run_once().await;
    (status_for(&outcome), Json(outcome))
}
