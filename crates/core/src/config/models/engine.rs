use serde::{Deserialize, Serialize};

use crate::models::GENERAL_CATEGORY;

/// 工单分配策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategyKind {
    #[default]
    Priority,
    RoundRobin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    pub strategy: AssignmentStrategyKind,
    pub fallback_category: String,
    /// 轮询指针CAS失败后的最大重试次数
    pub rotation_max_retries: u32,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            strategy: AssignmentStrategyKind::Priority,
            fallback_category: GENERAL_CATEGORY.to_string(),
            rotation_max_retries: 3,
        }
    }
}

impl AssignmentConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fallback_category.trim().is_empty() {
            return Err(anyhow::anyhow!("兜底分类不能为空"));
        }
        if self.rotation_max_retries == 0 {
            return Err(anyhow::anyhow!("轮询重试次数必须大于0"));
        }
        Ok(())
    }
}

/// 定时任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub enabled: bool,
    pub sla_check_interval_seconds: u64,
    pub auto_close_interval_seconds: u64,
    pub reassignment_interval_seconds: u64,
    pub auto_close_idle_days: i64,
    pub sla_closed_lookback_hours: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sla_check_interval_seconds: 300,
            auto_close_interval_seconds: 3600,
            reassignment_interval_seconds: 60,
            auto_close_idle_days: 7,
            sla_closed_lookback_hours: 24,
        }
    }
}

impl JobsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sla_check_interval_seconds == 0
            || self.auto_close_interval_seconds == 0
            || self.reassignment_interval_seconds == 0
        {
            return Err(anyhow::anyhow!("定时任务间隔必须大于0"));
        }
        if self.auto_close_idle_days <= 0 {
            return Err(anyhow::anyhow!("自动关闭闲置天数必须大于0"));
        }
        if self.sla_closed_lookback_hours < 0 {
            return Err(anyhow::anyhow!("SLA回溯时间不能为负数"));
        }
        Ok(())
    }
}

/// 通知投递配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
    pub send_timeout_ms: u64,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// 退避时间的随机抖动比例 (0.0 - 1.0)
    pub jitter: f64,
    pub webhook_url: Option<String>,
    /// 工单未分配时SLA告警的接收人
    pub admin_recipient: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            send_timeout_ms: 5000,
            max_attempts: 3,
            base_backoff_ms: 200,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: 0.1,
            webhook_url: None,
            admin_recipient: "admin".to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_capacity == 0 {
            return Err(anyhow::anyhow!("通知队列容量必须大于0"));
        }
        if self.send_timeout_ms == 0 {
            return Err(anyhow::anyhow!("通知发送超时必须大于0"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("通知最大尝试次数必须大于0"));
        }
        if self.max_backoff_ms < self.base_backoff_ms {
            return Err(anyhow::anyhow!("最大退避时间不能小于初始退避时间"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!("退避倍数不能小于1"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(anyhow::anyhow!("抖动比例必须在0到1之间"));
        }
        if self.admin_recipient.is_empty() {
            return Err(anyhow::anyhow!("管理员接收人不能为空"));
        }
        Ok(())
    }
}

/// AI文本服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            timeout_ms: 3000,
        }
    }
}

impl AiConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled {
            match &self.endpoint {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => return Err(anyhow::anyhow!("AI服务地址格式无效: {url}")),
                None => return Err(anyhow::anyhow!("启用AI服务时必须配置服务地址")),
            }
        }
        if self.timeout_ms == 0 {
            return Err(anyhow::anyhow!("AI服务超时必须大于0"));
        }
        Ok(())
    }
}
