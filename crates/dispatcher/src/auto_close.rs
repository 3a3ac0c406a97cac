use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use helpdesk_core::{
    models::{Notification, NotificationType},
    HelpdeskResult, TicketRepository,
};
use helpdesk_infrastructure::MetricsCollector;

use crate::job_runner::JobSummary;
use crate::notification_dispatcher::NotificationDispatcher;

/// 自动关闭坐席长时间未回复的 open 工单，并向客户发出满意度调查
pub struct AutoCloseJob {
    ticket_repo: Arc<dyn TicketRepository>,
    notifications: NotificationDispatcher,
    metrics: Arc<MetricsCollector>,
    idle_period: Duration,
}

impl AutoCloseJob {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        notifications: NotificationDispatcher,
        metrics: Arc<MetricsCollector>,
        idle_days: i64,
    ) -> Self {
        Self {
            ticket_repo,
            notifications,
            metrics,
            idle_period: Duration::days(idle_days),
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> HelpdeskResult<JobSummary> {
        let cutoff = now - self.idle_period;
        let candidates = self.ticket_repo.list_idle_pending(cutoff).await?;
        let mut summary = JobSummary::scanned(candidates.len());

        for ticket in candidates {
            // 以条件更新为准，扫描后被回复或已关闭的工单不会被关闭
            match self.ticket_repo.close_if_idle(ticket.id, cutoff, now).await {
                Ok(true) => {
                    summary.affected += 1;
                    debug!("自动关闭闲置工单 #{}", ticket.id);

                    self.notifications.dispatch(Notification::new(
                        &ticket.tenant_id,
                        &ticket.customer_id,
                        NotificationType::FeedbackRequest,
                        Some(ticket.id),
                        format!("工单 #{} '{}' 已关闭，请为本次服务评分", ticket.id, ticket.subject),
                    ));
                }
                Ok(false) => {
                    summary.skipped += 1;
                    debug!("工单 #{} 状态已变化，跳过自动关闭", ticket.id);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("自动关闭工单 #{} 失败: {}", ticket.id, e);
                }
            }
        }

        if summary.affected > 0 {
            info!("自动关闭了 {} 个闲置工单", summary.affected);
            self.metrics.record_auto_closed(summary.affected as u64);
        }
        Ok(summary)
    }
}
