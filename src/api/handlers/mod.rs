pub mod health;
pub mod ingest;
pub mod readings;
pub mod scheduler;
pub mod status;
