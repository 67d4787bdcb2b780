pub mod config;
pub mod database;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod normalizer;
pub mod notification_hub;
pub mod pipeline;
pub mod reconciler;
pub mod scheduler;
pub mod utils;
pub mod walker;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use notification_hub::NotificationHub;
pub use pipeline::CatalogPipeline;
pub use scheduler::PipelineScheduler;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
