pub mod api;
pub mod coerce;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod ingest;
pub mod models;
pub mod repositories;
pub mod scheduler;
pub mod teslafi;
pub mod units;

pub use config::Config;
pub use error::{AppError, Result};
