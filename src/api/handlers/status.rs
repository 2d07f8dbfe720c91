use crate::api::AppState;
use crate::history;
use crate::models::ReadingView;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub database_connected: bool,
    pub record_count: Option<i64>,
    pub latest_reading: Option<ReadingView>,
    pub token_configured: bool,
    pub scheduler_running: bool,
}

/// Always answers 200; failures show up as fields.
pub async fn get_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    let record_count = match history::record_count(state.store.as_ref()).await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::error!(error = %e, "status: counting readings failed");
            None
        }
    };

    let latest_reading = if record_count.is_some() {
        match history::latest(state.store.as_ref()).await {
            Ok(reading) => reading,
            Err(e) => {
                tracing::error!(error = %e, "status: loading latest reading failed");
                None
            }
        }
    } else {
        None
    };

    Json(ServiceStatus {
        database_connected: record_count.is_some(),
        record_count,
        latest_reading,
        token_configured: state.token_configured,
        scheduler_running: state.scheduler.is_running(),
    })
}
