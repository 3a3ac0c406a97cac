//! 定时改派
//!
//! 找出负责人已不可用的待处理工单，通过可用性轮询选出新坐席。
//! 选人前重新读取工单与原负责人，条件写入保证与人工操作并发时不会覆盖。
//! 原负责人恢复可用或没有替代人选时不做任何改动。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use helpdesk_core::{
    models::{
        Agent, Notification, NotificationType, ReassignmentLog, ReassignmentReason, Ticket,
        TriggeredBy,
    },
    AgentRepository, CandidatePoolRepository, HelpdeskResult, TicketRepository,
};
use helpdesk_infrastructure::MetricsCollector;

use crate::job_runner::JobSummary;
use crate::notification_dispatcher::NotificationDispatcher;
use crate::rotation::{customer_subject, queue_subject, AvailabilityRotation};

enum SweepOutcome {
    Reassigned,
    Unchanged,
}

pub struct ReassignmentJob {
    ticket_repo: Arc<dyn TicketRepository>,
    agent_repo: Arc<dyn AgentRepository>,
    pool_repo: Arc<dyn CandidatePoolRepository>,
    rotation: AvailabilityRotation,
    notifications: NotificationDispatcher,
    metrics: Arc<MetricsCollector>,
    fallback_category: String,
}

impl ReassignmentJob {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        pool_repo: Arc<dyn CandidatePoolRepository>,
        rotation: AvailabilityRotation,
        notifications: NotificationDispatcher,
        metrics: Arc<MetricsCollector>,
        fallback_category: impl Into<String>,
    ) -> Self {
        Self {
            ticket_repo,
            agent_repo,
            pool_repo,
            rotation,
            notifications,
            metrics,
            fallback_category: fallback_category.into(),
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> HelpdeskResult<JobSummary> {
        let tickets = self.ticket_repo.list_pending_assigned().await?;
        let mut summary = JobSummary::scanned(tickets.len());

        for ticket in tickets {
            match self.sweep_ticket(&ticket, now).await {
                Ok(SweepOutcome::Reassigned) => summary.affected += 1,
                Ok(SweepOutcome::Unchanged) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!("改派工单 #{} 失败: {}", ticket.id, e);
                }
            }
        }

        if summary.affected > 0 {
            info!("本次扫描改派了 {} 个工单", summary.affected);
            self.metrics.record_reassignments(summary.affected as u64);
        }
        Ok(summary)
    }

    /// 负责人不可用的原因，坐席已被删除时视为不可用
    async fn incumbent_unavailability(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<Option<&'static str>> {
        Ok(match self.agent_repo.get_by_id(agent_id).await? {
            Some(agent) => agent.unavailability(now),
            None => Some("missing"),
        })
    }

    async fn sweep_ticket(&self, ticket: &Ticket, now: DateTime<Utc>) -> HelpdeskResult<SweepOutcome> {
        let Some(incumbent) = ticket.agent_id.as_deref() else {
            return Ok(SweepOutcome::Unchanged);
        };
        if self.incumbent_unavailability(incumbent, now).await?.is_none() {
            return Ok(SweepOutcome::Unchanged);
        }

        // 推进轮询指针前基于最新状态重新校验，跳过的工单不占用轮询位置
        let Some(current) = self.ticket_repo.get_by_id(ticket.id).await? else {
            return Ok(SweepOutcome::Unchanged);
        };
        if current.agent_id.as_deref() != Some(incumbent) || !current.status.is_pending() {
            debug!("工单 #{} 在扫描后已被修改，跳过改派", ticket.id);
            return Ok(SweepOutcome::Unchanged);
        }
        let Some(reason) = self.incumbent_unavailability(incumbent, now).await? else {
            debug!("工单 #{} 的负责人 {} 已恢复可用", ticket.id, incumbent);
            return Ok(SweepOutcome::Unchanged);
        };

        let (subject, candidates) = self.candidate_pool(&current, now).await?;
        let Some(next) = self.rotation.next_available(&subject, &candidates, now).await? else {
            debug!(
                "工单 #{} 的负责人 {} 不可用 ({})，但没有替代坐席",
                ticket.id, incumbent, reason
            );
            return Ok(SweepOutcome::Unchanged);
        };
        if next.id == incumbent {
            return Ok(SweepOutcome::Unchanged);
        }

        let log = ReassignmentLog::new(
            &current.tenant_id,
            current.id,
            Some(incumbent.to_string()),
            &next.id,
            ReassignmentReason::Leave,
            TriggeredBy::Cron,
            now,
        );
        if !self
            .ticket_repo
            .reassign_with_log(current.id, Some(incumbent), &log)
            .await?
        {
            warn!("工单 #{} 改派冲突，负责人已被并发修改", current.id);
            return Ok(SweepOutcome::Unchanged);
        }

        info!(
            "工单 #{} 从坐席 {} ({}) 改派给 {} (主体: {})",
            current.id, incumbent, reason, next.id, subject
        );
        self.notifications.dispatch(Notification::new(
            &current.tenant_id,
            &next.id,
            NotificationType::TicketReassigned,
            Some(current.id),
            format!("工单 #{} '{}' 已改派给您", current.id, current.subject),
        ));

        Ok(SweepOutcome::Reassigned)
    }

    /// 客户配置了专属坐席池时使用坐席池，否则使用租户内服务该分类的坐席
    async fn candidate_pool(
        &self,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<(String, Vec<Agent>)> {
        let agents = self.agent_repo.list_by_tenant(&ticket.tenant_id).await?;

        if let Some(pool) = self
            .pool_repo
            .get(&ticket.tenant_id, &ticket.customer_id)
            .await?
        {
            let candidates = pool
                .agent_ids
                .iter()
                .filter_map(|id| agents.iter().find(|a| &a.id == id).cloned())
                .collect();
            return Ok((customer_subject(&ticket.customer_id), candidates));
        }

        let serving: Vec<Agent> = agents
            .iter()
            .filter(|a| a.serves(&ticket.category))
            .cloned()
            .collect();

        if serving.iter().any(|a| a.is_available(now)) || ticket.category == self.fallback_category {
            return Ok((queue_subject(&ticket.tenant_id, &ticket.category), serving));
        }

        let fallback = agents
            .into_iter()
            .filter(|a| a.serves(&self.fallback_category))
            .collect();
        Ok((queue_subject(&ticket.tenant_id, &self.fallback_category), fallback))
    }
}
