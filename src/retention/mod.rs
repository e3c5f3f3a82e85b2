pub mod service;

pub use service::RetentionService;
