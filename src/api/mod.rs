pub mod handlers;
pub mod routes;

pub use routes::create_router;

use crate::ingest::IngestPipeline;
use crate::repositories::ReadingStore;
use crate::scheduler::IngestionScheduler;
use std::sync::Arc;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub pipeline: IngestPipeline,
    pub scheduler: IngestionScheduler,
    pub token_configured: bool,
}
