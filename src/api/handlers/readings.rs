use crate::api::AppState;
use crate::error::Result;
use crate::history::{self, HistoryQuery};
use crate::models::{DailySummary, ReadingView};
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use std::collections::HashMap;

pub async fn get_latest(State(state): State<AppState>) -> Result<Json<Option<ReadingView>>> {
    let reading = history::latest(state.store.as_ref()).await?;
    Ok(Json(reading))
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ReadingView>>> {
    let query = HistoryQuery::from_params(&params)?;
    let readings = history::query_history(state.store.as_ref(), &query, Utc::now()).await?;
    Ok(Json(readings))
}

pub async fn get_daily_summary(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<DailySummary>>> {
    let query = HistoryQuery::from_params(&params)?;
    let readings = history::readings_in_range(state.store.as_ref(), &query, Utc::now()).await?;
    Ok(Json(history::summarize_daily(&readings)))
}
