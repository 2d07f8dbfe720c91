//! Normalize-and-store for one snapshot, and the fetch-then-store cycle.

use crate::error::AppError;
use crate::models::{external_id_of, NewReading, Payload};
use crate::repositories::{InsertResult, ReadingStore};
use crate::teslafi::TelemetrySource;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Which stage rejected a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidPayload,
    Upstream,
    Storage,
    /// The cycle itself crashed.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Success {
        external_id: i64,
    },
    Duplicate {
        external_id: i64,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        external_id: Option<i64>,
        reason: FailureReason,
        message: String,
    },
}

impl IngestOutcome {
    pub fn error(external_id: Option<i64>, reason: FailureReason, message: impl Into<String>) -> Self {
        IngestOutcome::Error {
            external_id,
            reason,
            message: message.into(),
        }
    }
}

/// Validates, deduplicates and persists snapshots.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ReadingStore>,
    store_timeout: Duration,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ReadingStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Never fails: every path ends in an [`IngestOutcome`]. Safe to call
    /// repeatedly and concurrently with the same payload.
    pub async fn ingest(&self, payload: &Payload) -> IngestOutcome {
        let Some(external_id) = external_id_of(payload) else {
            warn!("rejecting snapshot without data_id");
            return IngestOutcome::error(
                None,
                FailureReason::InvalidPayload,
                "payload is missing data_id",
            );
        };

        match self.store_once(external_id, payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(external_id, error = %e, "storing snapshot failed");
                IngestOutcome::error(Some(external_id), FailureReason::Storage, e.to_string())
            }
        }
    }

    async fn store_once(
        &self,
        external_id: i64,
        payload: &Payload,
    ) -> Result<IngestOutcome, AppError> {
        let existing = self
            .bounded(self.store.find_by_external_id(external_id))
            .await?;
        if existing.is_some() {
            info!(external_id, "snapshot already stored");
            return Ok(IngestOutcome::Duplicate { external_id });
        }

        let reading = NewReading::from_payload(external_id, payload, Utc::now());
        // insert bounds itself, see ReadingStore
        match self.store.insert(&reading).await? {
            InsertResult::Inserted { id } => {
                info!(external_id, id, "snapshot stored");
                Ok(IngestOutcome::Success { external_id })
            }
            InsertResult::AlreadyExists => {
                info!(external_id, "snapshot stored concurrently by another caller");
                Ok(IngestOutcome::Duplicate { external_id })
            }
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "storage did not answer within {}s",
                    self.store_timeout.as_secs()
                ))
            })?
    }
}

/// Fetch one snapshot and hand it to the [`Ingestor`]. Shared by the
/// scheduler and manual triggers.
#[derive(Clone)]
pub struct IngestPipeline {
    source: Arc<dyn TelemetrySource>,
    ingestor: Ingestor,
}

impl IngestPipeline {
    pub fn new(source: Arc<dyn TelemetrySource>, ingestor: Ingestor) -> Self {
        Self { source, ingestor }
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub async fn run_once(&self) -> IngestOutcome {
        let payload = match self.source.fetch_snapshot().await {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "fetching snapshot failed; skipping store");
                // local failures such as a bad base_url are not upstream
                let reason = if e.is_upstream() {
                    FailureReason::Upstream
                } else {
                    FailureReason::Internal
                };
                return IngestOutcome::error(None, reason, e.to_string());
            }
        };
        self.ingestor.ingest(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_json_shape() {
        let ok = serde_json::to_value(IngestOutcome::Success { external_id: 42 }).unwrap();
        assert_eq!(ok, json!({"status": "success", "external_id": 42}));

        let dup = serde_json::to_value(IngestOutcome::Duplicate { external_id: 42 }).unwrap();
        assert_eq!(dup, json!({"status": "duplicate", "external_id": 42}));

        let err = serde_json::to_value(IngestOutcome::error(
            None,
            FailureReason::InvalidPayload,
            "payload is missing data_id",
        ))
        .unwrap();
        assert_eq!(
            err,
            json!({
                "status": "error",
                "reason": "invalid_payload",
                "message": "payload is missing data_id"
            })
        );
    }
}
