//! 通知分发
//!
//! 状态变更提交之后再入队，入队不阻塞调用方：队列满时丢弃并计数。
//! 后台 worker 先写站内通知，再调用外部通道，外部通道带超时与指数退避重试，
//! 失败只记录日志。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use helpdesk_core::{
    config::NotificationConfig, models::Notification, HelpdeskError, HelpdeskResult,
    NotificationRepository, Notifier,
};
use helpdesk_infrastructure::MetricsCollector;

/// 外部通道的重试策略
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub send_timeout: Duration,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// 重试间隔的随机抖动范围（0.0-1.0）
    pub jitter: f64,
}

impl From<&NotificationConfig> for DeliveryPolicy {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            max_attempts: config.max_attempts.max(1),
            base_backoff_ms: config.base_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

impl DeliveryPolicy {
    /// 第 `attempt` 次失败后的等待时间（attempt 从 1 开始）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff_ms as f64;
        let exponential = base * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = exponential.min(self.max_backoff_ms as f64);

        let jitter = capped * self.jitter * (rand::random::<f64>() - 0.5) * 2.0;
        let millis = (capped + jitter).max(0.0);

        Duration::from_millis(millis as u64)
    }
}

/// 通知入队句柄，可随意克隆
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Notification>,
    metrics: Arc<MetricsCollector>,
}

impl NotificationDispatcher {
    /// 创建入队句柄与对应的后台 worker
    pub fn new(
        config: &NotificationConfig,
        repo: Arc<dyn NotificationRepository>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<MetricsCollector>,
    ) -> (Self, NotificationWorker) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));

        let dispatcher = Self {
            sender,
            metrics: metrics.clone(),
        };
        let worker = NotificationWorker {
            receiver,
            repo,
            notifier,
            policy: DeliveryPolicy::from(config),
            metrics,
        };

        (dispatcher, worker)
    }

    /// 入队，不等待投递结果，返回是否成功入队
    pub fn dispatch(&self, notification: Notification) -> bool {
        let recipient = notification.recipient_id.clone();
        let kind = notification.notification_type;

        match self.sender.try_send(notification) {
            Ok(()) => {
                debug!("通知已入队: {} -> {}", kind, recipient);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("通知队列已满，丢弃通知: {} -> {}", kind, recipient);
                self.metrics.record_notification_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("通知队列已关闭，丢弃通知: {} -> {}", kind, recipient);
                self.metrics.record_notification_dropped();
                false
            }
        }
    }
}

pub struct NotificationWorker {
    receiver: mpsc::Receiver<Notification>,
    repo: Arc<dyn NotificationRepository>,
    notifier: Arc<dyn Notifier>,
    policy: DeliveryPolicy,
    metrics: Arc<MetricsCollector>,
}

impl NotificationWorker {
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// 处理队列直到收到关闭信号或所有发送端被释放
    ///
    /// 收到关闭信号后会把已入队的通知处理完再退出。
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("通知分发器已启动 (通道: {})", self.notifier.name());

        loop {
            tokio::select! {
                received = self.receiver.recv() => {
                    match received {
                        Some(notification) => self.deliver(&notification).await,
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    self.receiver.close();
                    while let Some(notification) = self.receiver.recv().await {
                        self.deliver(&notification).await;
                    }
                    break;
                }
            }
        }

        info!("通知分发器已停止");
    }

    /// 写入站内通知并推送到外部通道
    pub async fn deliver(&self, notification: &Notification) {
        if let Err(e) = self.repo.create(notification).await {
            error!(
                "保存站内通知失败 ({} -> {}): {}",
                notification.notification_type, notification.recipient_id, e
            );
        }

        match self.send_with_retry(notification).await {
            Ok(()) => self.metrics.record_notification_sent(),
            Err(e) => {
                self.metrics.record_notification_failed();
                warn!(
                    "通知推送失败，已放弃 ({} -> {}): {}",
                    notification.notification_type, notification.recipient_id, e
                );
            }
        }
    }

    async fn send_with_retry(&self, notification: &Notification) -> HelpdeskResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = tokio::time::timeout(
                self.policy.send_timeout,
                self.notifier.send(
                    &notification.recipient_id,
                    notification.ticket_id,
                    &notification.message,
                ),
            )
            .await
            .unwrap_or_else(|_| {
                Err(HelpdeskError::external(format!(
                    "通知通道 {} 超时",
                    self.notifier.name()
                )))
            });

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    debug!(
                        "通知推送第 {} 次失败，{}ms 后重试: {}",
                        attempt,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
