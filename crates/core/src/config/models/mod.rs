pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod engine;

pub use api_observability::{ApiConfig, AuthConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use engine::{AiConfig, AssignmentConfig, AssignmentStrategyKind, JobsConfig, NotificationConfig};
