use crate::config::models::AppConfig;

#[test]
fn test_rejects_non_sqlite_url() {
    let mut config = AppConfig::default();
    config.database.url = "postgresql://localhost/helpdesk".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_rejects_short_jwt_secret() {
    let mut config = AppConfig::default();
    config.api.auth.jwt_secret = "short".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_rejects_invalid_jobs_settings() {
    let mut config = AppConfig::default();
    config.jobs.auto_close_idle_days = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.jobs.sla_check_interval_seconds = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_rejects_invalid_notification_settings() {
    let mut config = AppConfig::default();
    config.notifications.jitter = 1.5;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.notifications.max_backoff_ms = 10;
    assert!(config.validate().is_err());
}

#[test]
fn test_ai_requires_endpoint_when_enabled() {
    let mut config = AppConfig::default();
    config.ai.enabled = true;
    assert!(config.validate().is_err());

    config.ai.endpoint = Some("http://localhost:8500/v1".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_rejects_unknown_log_format() {
    let mut config = AppConfig::default();
    config.observability.log_format = "xml".to_string();
    assert!(config.validate().is_err());
}
