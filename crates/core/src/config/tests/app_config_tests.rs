use crate::config::models::{AppConfig, AssignmentStrategyKind};

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    // 验证默认值
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.assignment.strategy, AssignmentStrategyKind::Priority);
    assert_eq!(config.assignment.fallback_category, "general");
    assert_eq!(config.assignment.rotation_max_retries, 3);
    assert_eq!(config.jobs.auto_close_idle_days, 7);
    assert!(config.api.enabled);
    assert!(!config.ai.enabled);
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[database]
url = "sqlite::memory:"
max_connections = 4

[api]
bind_address = "127.0.0.1:9000"

[assignment]
strategy = "round_robin"

[jobs]
auto_close_idle_days = 14
sla_closed_lookback_hours = 48

[notifications]
max_attempts = 5
jitter = 0.25
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.database.url, "sqlite::memory:");
    assert_eq!(config.database.max_connections, 4);
    assert_eq!(config.api.bind_address, "127.0.0.1:9000");
    assert_eq!(config.assignment.strategy, AssignmentStrategyKind::RoundRobin);
    assert_eq!(config.jobs.auto_close_idle_days, 14);
    assert_eq!(config.jobs.sla_closed_lookback_hours, 48);
    assert_eq!(config.notifications.max_attempts, 5);

    // 未配置的字段使用默认值
    assert_eq!(config.jobs.reassignment_interval_seconds, 60);
    assert_eq!(config.notifications.queue_capacity, 1024);
}

#[test]
fn test_config_toml_roundtrip() {
    let mut config = AppConfig::default();
    config.assignment.strategy = AssignmentStrategyKind::RoundRobin;
    config.ai.timeout_ms = 1500;

    let toml_str = config.to_toml().unwrap();
    assert!(toml_str.contains("round_robin"));

    let parsed = AppConfig::from_toml(&toml_str).unwrap();
    assert_eq!(parsed.assignment.strategy, AssignmentStrategyKind::RoundRobin);
    assert_eq!(parsed.ai.timeout_ms, 1500);
}

#[test]
fn test_load_missing_file_fails() {
    let result = AppConfig::load(Some("/nonexistent/helpdesk.toml"));
    assert!(result.is_err());
}
