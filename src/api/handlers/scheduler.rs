use crate::api::AppState;
use crate::scheduler::SchedulerStatus;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    /// False when the request was a no-op.
    pub changed: bool,
    pub status: SchedulerStatus,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

pub async fn start(State(state): State<AppState>) -> Json<ControlResponse> {
    let changed = state.scheduler.start();
    Json(ControlResponse {
        changed,
        status: state.scheduler.status(),
    })
}

pub async fn stop(State(state): State<AppState>) -> Json<ControlResponse> {
    let changed = state.scheduler.stop();
    Json(ControlResponse {
        changed,
        status: state.scheduler.status(),
    })
}
