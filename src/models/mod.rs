pub mod reading;
pub mod summary;

pub use reading::{external_id_of, NewReading, Payload, Reading, ReadingView};
pub use summary::DailySummary;
