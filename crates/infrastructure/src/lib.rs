pub mod ai_client;
pub mod database;
pub mod in_memory_store;
pub mod notifier;
pub mod observability;
pub mod repositories;

pub use ai_client::{DisabledAiTextService, HttpAiTextService};
pub use database::*;
pub use in_memory_store::InMemoryStore;
pub use notifier::{LogNotifier, WebhookNotifier};
pub use observability::{install_prometheus_exporter, MetricsCollector};
pub use repositories::Repositories;
