pub mod payload;
pub mod service;

pub use service::{IngestError, PruneReport, ReadingService, ServiceSettings};
