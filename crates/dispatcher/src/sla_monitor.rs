//! SLA检查
//!
//! [`SlaMonitor`] 只读，计算每个工单的响应/解决违约标记；
//! [`BreachNotifier`] 消费检查结果，借助去重标记保证同一规则只通知一次。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use helpdesk_core::{
    models::{
        BreachKind, Notification, NotificationType, SlaBreachMarker, SlaReport, SlaRule, Ticket,
        TicketPriority,
    },
    BreachMarkerRepository, HelpdeskResult, SlaRuleRepository, TicketRepository,
};
use helpdesk_infrastructure::MetricsCollector;

use crate::notification_dispatcher::NotificationDispatcher;

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// 先匹配租户+优先级的规则，找不到时使用租户默认规则
pub fn resolve_rule<'a>(rules: &'a [SlaRule], priority: TicketPriority) -> Option<&'a SlaRule> {
    rules
        .iter()
        .find(|rule| rule.priority == Some(priority))
        .or_else(|| rules.iter().find(|rule| rule.is_tenant_default()))
}

/// 计算单个工单的SLA状态
pub fn evaluate(ticket: &Ticket, rule: &SlaRule, now: DateTime<Utc>) -> SlaReport {
    let elapsed_hours = hours_between(ticket.created_at, now);
    let first_response_hours = ticket
        .first_agent_response_at()
        .map(|at| hours_between(ticket.created_at, at));

    let response_breach = match first_response_hours {
        None => elapsed_hours > rule.response_hours,
        Some(hours) => hours > rule.response_hours,
    };

    let resolution_breach = match (ticket.is_closed(), ticket.closed_at) {
        (true, Some(closed_at)) => {
            hours_between(ticket.created_at, closed_at) > rule.resolution_hours
        }
        _ => false,
    };

    SlaReport {
        ticket_id: ticket.id,
        tenant_id: ticket.tenant_id.clone(),
        agent_id: ticket.agent_id.clone(),
        rule_id: rule.id,
        elapsed_hours,
        first_response_hours,
        response_breach,
        resolution_breach,
    }
}

pub struct SlaMonitor {
    ticket_repo: Arc<dyn TicketRepository>,
    rule_repo: Arc<dyn SlaRuleRepository>,
    closed_lookback: Duration,
}

impl SlaMonitor {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        rule_repo: Arc<dyn SlaRuleRepository>,
        closed_lookback_hours: i64,
    ) -> Self {
        Self {
            ticket_repo,
            rule_repo,
            closed_lookback: Duration::hours(closed_lookback_hours),
        }
    }

    /// 检查范围内所有配置了规则的工单，不修改任何工单状态
    pub async fn check_at(&self, now: DateTime<Utc>) -> HelpdeskResult<Vec<SlaReport>> {
        let tickets = self
            .ticket_repo
            .list_for_sla(now - self.closed_lookback)
            .await?;

        let mut rules_by_tenant: HashMap<String, Vec<SlaRule>> = HashMap::new();
        let mut reports = Vec::with_capacity(tickets.len());

        for ticket in &tickets {
            if !rules_by_tenant.contains_key(&ticket.tenant_id) {
                let rules = self.rule_repo.list_by_tenant(&ticket.tenant_id).await?;
                rules_by_tenant.insert(ticket.tenant_id.clone(), rules);
            }

            let rules = rules_by_tenant
                .get(&ticket.tenant_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            match resolve_rule(rules, ticket.priority) {
                Some(rule) => reports.push(evaluate(ticket, rule, now)),
                None => debug!("工单 #{} 所在租户 {} 未配置SLA规则", ticket.id, ticket.tenant_id),
            }
        }

        let breached = reports.iter().filter(|r| r.has_breach()).count();
        debug!("SLA检查完成: {} 个工单, {} 个违约", reports.len(), breached);
        Ok(reports)
    }
}

pub struct BreachNotifier {
    marker_repo: Arc<dyn BreachMarkerRepository>,
    notifications: NotificationDispatcher,
    metrics: Arc<MetricsCollector>,
    admin_recipient: String,
}

impl BreachNotifier {
    pub fn new(
        marker_repo: Arc<dyn BreachMarkerRepository>,
        notifications: NotificationDispatcher,
        metrics: Arc<MetricsCollector>,
        admin_recipient: impl Into<String>,
    ) -> Self {
        Self {
            marker_repo,
            notifications,
            metrics,
            admin_recipient: admin_recipient.into(),
        }
    }

    /// 对新出现的违约发送通知，返回新通知的数量
    pub async fn notify_at(&self, reports: &[SlaReport], now: DateTime<Utc>) -> usize {
        let mut notified = 0;

        for report in reports.iter().filter(|r| r.has_breach()) {
            for kind in report.breaches() {
                let marker = SlaBreachMarker {
                    ticket_id: report.ticket_id,
                    kind,
                    rule_id: report.rule_id,
                    notified_at: now,
                };

                match self.marker_repo.try_mark(&marker).await {
                    Ok(true) if self.send(report, kind) => notified += 1,
                    Ok(true) => {
                        // 未入队则撤销标记，下一轮重新通知
                        if let Err(e) = self.marker_repo.unmark(&marker).await {
                            warn!(
                                "撤销工单 #{} 的违约标记失败 ({}): {}",
                                report.ticket_id, kind, e
                            );
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!(
                        "写入工单 #{} 的违约标记失败 ({}): {}",
                        report.ticket_id, kind, e
                    ),
                }
            }
        }

        if notified > 0 {
            info!("发送了 {} 条SLA违约通知", notified);
            self.metrics.record_sla_breaches(notified as u64);
        }
        notified
    }

    fn send(&self, report: &SlaReport, kind: BreachKind) -> bool {
        let recipient = report
            .agent_id
            .clone()
            .unwrap_or_else(|| self.admin_recipient.clone());

        let message = match kind {
            BreachKind::Response => format!(
                "工单 #{} 超出响应时限 (已过去 {:.1} 小时)",
                report.ticket_id, report.elapsed_hours
            ),
            BreachKind::Resolution => format!("工单 #{} 超出解决时限", report.ticket_id),
        };

        self.notifications.dispatch(Notification::new(
            &report.tenant_id,
            recipient,
            NotificationType::SlaBreach,
            Some(report.ticket_id),
            message,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::models::{TicketMessage, TicketStatus};

    fn rule(priority: Option<TicketPriority>, response: f64, resolution: f64) -> SlaRule {
        SlaRule {
            id: 1,
            tenant_id: "t1".into(),
            priority,
            response_hours: response,
            resolution_hours: resolution,
        }
    }

    fn ticket_created_hours_ago(now: DateTime<Utc>, hours: i64) -> Ticket {
        let mut ticket = Ticket::new("t1", "cust", "s", "general");
        ticket.id = 1;
        ticket.created_at = now - Duration::hours(hours);
        ticket
    }

    #[test]
    fn test_response_breach_without_reply() {
        let now = Utc::now();
        let ticket = ticket_created_hours_ago(now, 30);

        let report = evaluate(&ticket, &rule(None, 24.0, 72.0), now);
        assert!(report.response_breach);
        assert!(!report.resolution_breach);
        assert!(report.first_response_hours.is_none());
    }

    #[test]
    fn test_timely_agent_reply_is_not_a_breach() {
        let now = Utc::now();
        let mut ticket = ticket_created_hours_ago(now, 30);
        ticket.messages.push(TicketMessage {
            sender_id: "cust".into(),
            text: "hello".into(),
            created_at: ticket.created_at + Duration::hours(1),
        });
        ticket.messages.push(TicketMessage {
            sender_id: "agent".into(),
            text: "hi".into(),
            created_at: ticket.created_at + Duration::hours(10),
        });

        let report = evaluate(&ticket, &rule(None, 24.0, 72.0), now);
        assert!(!report.response_breach);
        assert_eq!(report.first_response_hours, Some(10.0));
    }

    #[test]
    fn test_resolution_breach_only_for_closed_tickets() {
        let now = Utc::now();
        let mut ticket = ticket_created_hours_ago(now, 100);
        ticket.messages.push(TicketMessage {
            sender_id: "agent".into(),
            text: "hi".into(),
            created_at: ticket.created_at + Duration::hours(1),
        });

        let open = evaluate(&ticket, &rule(None, 24.0, 72.0), now);
        assert!(!open.resolution_breach);

        ticket.status = TicketStatus::Closed;
        ticket.closed_at = Some(ticket.created_at + Duration::hours(80));
        let closed = evaluate(&ticket, &rule(None, 24.0, 72.0), now);
        assert!(closed.resolution_breach);
        assert_eq!(closed.breaches(), vec![BreachKind::Resolution]);
    }

    #[test]
    fn test_rule_resolution_prefers_priority_specific() {
        let rules = vec![
            rule(None, 24.0, 72.0),
            SlaRule {
                id: 2,
                ..rule(Some(TicketPriority::High), 4.0, 8.0)
            },
        ];

        assert_eq!(resolve_rule(&rules, TicketPriority::High).unwrap().id, 2);
        assert_eq!(resolve_rule(&rules, TicketPriority::Low).unwrap().id, 1);
        assert!(resolve_rule(&rules[1..], TicketPriority::Low).is_none());
    }
}
