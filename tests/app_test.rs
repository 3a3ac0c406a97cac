use std::time::Duration;

use tokio::time::timeout;

use helpdesk::{app::Application, shutdown::ShutdownManager};
use helpdesk_core::config::AppConfig;

fn embedded_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.api.enabled = false;
    config.jobs.enabled = true;
    config.jobs.sla_check_interval_seconds = 1;
    config
}

#[tokio::test]
async fn test_application_starts_and_shuts_down() {
    let app = Application::new(embedded_config()).await.unwrap();
    let shutdown = ShutdownManager::new();
    let shutdown_rx = shutdown.subscribe().await;

    let handle = tokio::spawn(app.run(shutdown_rx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown().await;

    let result = timeout(Duration::from_secs(5), handle).await;
    assert!(result.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_invalid_ai_config_fails_startup() {
    let mut config = embedded_config();
    config.ai.enabled = true;
    config.ai.endpoint = None;

    assert!(Application::new(config).await.is_err());
}
