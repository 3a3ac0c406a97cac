use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use helpdesk_core::{
    config::{AssignmentConfig, AssignmentStrategyKind},
    models::{
        Agent, Notification, NotificationType, Principal, Role, Ticket, TicketPriority,
        TicketStatus,
    },
    AgentRepository, HelpdeskError, HelpdeskResult, RotationRepository, TicketRepository,
};
use helpdesk_infrastructure::MetricsCollector;

use crate::notification_dispatcher::NotificationDispatcher;
use crate::rotation::{queue_subject, AvailabilityRotation};

/// 坐席选择策略
#[async_trait]
pub trait AgentSelectionStrategy: Send + Sync {
    /// `eligible` 已按分类与可用性过滤，返回 `None` 表示没有合适的坐席
    async fn select_agent(
        &self,
        ticket: &Ticket,
        category: &str,
        eligible: &[Agent],
        now: DateTime<Utc>,
    ) -> HelpdeskResult<Option<Agent>>;

    fn name(&self) -> &str;
}

/// 优先级高者优先，同优先级取最久未分配者，从未分配过的排最前，最后按ID
pub fn compare_for_assignment(a: &Agent, b: &Agent) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.last_assigned_at, b.last_assigned_at) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// 按分类筛选可用坐席，分类下无人可用时退回兜底分类
///
/// 返回实际使用的分类与候选坐席。
pub fn eligible_agents(
    agents: &[Agent],
    category: &str,
    fallback_category: &str,
    now: DateTime<Utc>,
) -> (String, Vec<Agent>) {
    let matching: Vec<Agent> = agents
        .iter()
        .filter(|agent| agent.is_eligible_for(category, now))
        .cloned()
        .collect();

    if !matching.is_empty() || category == fallback_category {
        return (category.to_string(), matching);
    }

    debug!("分类 {} 下没有可用坐席，退回分类 {}", category, fallback_category);
    let fallback = agents
        .iter()
        .filter(|agent| agent.is_eligible_for(fallback_category, now))
        .cloned()
        .collect();
    (fallback_category.to_string(), fallback)
}

pub struct PriorityStrategy;

impl PriorityStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PriorityStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentSelectionStrategy for PriorityStrategy {
    async fn select_agent(
        &self,
        ticket: &Ticket,
        _category: &str,
        eligible: &[Agent],
        _now: DateTime<Utc>,
    ) -> HelpdeskResult<Option<Agent>> {
        let selected = eligible.iter().min_by(|a, b| compare_for_assignment(a, b));

        if let Some(agent) = selected {
            debug!(
                "优先级策略为工单 #{} 选择坐席: {} (优先级: {})",
                ticket.id, agent.id, agent.priority
            );
        }

        Ok(selected.cloned())
    }

    fn name(&self) -> &str {
        "Priority"
    }
}

/// 在分类队列上轮询，候选顺序按优先级降序、ID升序固定
pub struct RoundRobinStrategy {
    rotation: AvailabilityRotation,
}

impl RoundRobinStrategy {
    pub fn new(rotation: AvailabilityRotation) -> Self {
        Self { rotation }
    }
}

#[async_trait]
impl AgentSelectionStrategy for RoundRobinStrategy {
    async fn select_agent(
        &self,
        ticket: &Ticket,
        category: &str,
        eligible: &[Agent],
        now: DateTime<Utc>,
    ) -> HelpdeskResult<Option<Agent>> {
        let mut ordered = eligible.to_vec();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        let subject = queue_subject(&ticket.tenant_id, category);
        self.rotation.next_available(&subject, &ordered, now).await
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }
}

/// 根据配置构建分配策略
pub fn strategy_from_config(
    config: &AssignmentConfig,
    rotation_repo: Arc<dyn RotationRepository>,
) -> Arc<dyn AgentSelectionStrategy> {
    match config.strategy {
        AssignmentStrategyKind::Priority => Arc::new(PriorityStrategy::new()),
        AssignmentStrategyKind::RoundRobin => Arc::new(RoundRobinStrategy::new(
            AvailabilityRotation::new(rotation_repo, config.rotation_max_retries),
        )),
    }
}

/// 分配结果，没有可用坐席属于正常结果而不是错误
#[derive(Debug, Clone)]
pub enum AssignmentOutcome {
    Assigned(Ticket),
    NoAgentAvailable,
}

pub struct AssignmentEngine {
    ticket_repo: Arc<dyn TicketRepository>,
    agent_repo: Arc<dyn AgentRepository>,
    strategy: Arc<dyn AgentSelectionStrategy>,
    notifications: NotificationDispatcher,
    metrics: Arc<MetricsCollector>,
    fallback_category: String,
}

impl AssignmentEngine {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        strategy: Arc<dyn AgentSelectionStrategy>,
        notifications: NotificationDispatcher,
        metrics: Arc<MetricsCollector>,
        fallback_category: impl Into<String>,
    ) -> Self {
        Self {
            ticket_repo,
            agent_repo,
            strategy,
            notifications,
            metrics,
            fallback_category: fallback_category.into(),
        }
    }

    pub async fn assign(
        &self,
        principal: &Principal,
        ticket_id: i64,
        priority: Option<&str>,
    ) -> HelpdeskResult<AssignmentOutcome> {
        self.assign_at(principal, ticket_id, priority, Utc::now())
            .await
    }

    pub async fn assign_at(
        &self,
        principal: &Principal,
        ticket_id: i64,
        priority: Option<&str>,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<AssignmentOutcome> {
        principal.require_role(&[Role::Agent, Role::Admin])?;

        let ticket = self
            .ticket_repo
            .get_by_id(ticket_id)
            .await?
            .ok_or_else(|| HelpdeskError::ticket_not_found(ticket_id))?;
        principal.ensure_tenant(&ticket.tenant_id)?;

        if ticket.is_assigned() || ticket.status != TicketStatus::Open {
            return Err(HelpdeskError::conflict(format!(
                "工单 #{ticket_id} 已被分配或状态为 {}",
                ticket.status
            )));
        }

        let priority = priority
            .map(TicketPriority::parse_or_default)
            .unwrap_or_default();

        let agents = self.agent_repo.list_by_tenant(&ticket.tenant_id).await?;
        let (category, eligible) =
            eligible_agents(&agents, &ticket.category, &self.fallback_category, now);

        let Some(agent) = self
            .strategy
            .select_agent(&ticket, &category, &eligible, now)
            .await?
        else {
            info!("工单 #{} 没有可用坐席 (分类: {})", ticket.id, ticket.category);
            self.metrics.record_no_agent_available();
            return Ok(AssignmentOutcome::NoAgentAvailable);
        };

        let sla_due = priority.sla_due(now);
        let committed = self
            .ticket_repo
            .assign_if_unassigned(ticket.id, &agent.id, priority, sla_due)
            .await?;

        if !committed {
            warn!("工单 #{} 分配冲突，已被其他请求分配", ticket.id);
            self.metrics.record_assignment_conflict();
            return Err(HelpdeskError::conflict(format!(
                "工单 #{ticket_id} 已被其他请求分配"
            )));
        }

        if let Err(e) = self.agent_repo.touch_last_assigned(&agent.id, now).await {
            warn!("更新坐席 {} 最近分配时间失败: {}", agent.id, e);
        }

        self.metrics.record_assignment();
        info!(
            "工单 #{} 已分配给坐席 {} (策略: {}, 优先级: {}, SLA截止: {})",
            ticket.id,
            agent.id,
            self.strategy.name(),
            priority,
            sla_due.format("%Y-%m-%d %H:%M:%S UTC")
        );

        self.notifications.dispatch(Notification::new(
            &ticket.tenant_id,
            &agent.id,
            NotificationType::TicketAssigned,
            Some(ticket.id),
            format!("工单 #{} '{}' 已分配给您", ticket.id, ticket.subject),
        ));

        let mut assigned = ticket;
        assigned.agent_id = Some(agent.id);
        assigned.priority = priority;
        assigned.status = TicketStatus::Assigned;
        assigned.sla_due = Some(sla_due);
        Ok(AssignmentOutcome::Assigned(assigned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn agent(id: &str, priority: i32, last: Option<DateTime<Utc>>) -> Agent {
        let mut agent = Agent::new(id, "t1", id);
        agent.priority = priority;
        agent.last_assigned_at = last;
        agent.categories = vec!["billing".into()];
        agent
    }

    #[test]
    fn test_tie_break_order() {
        let now = Utc::now();
        let mut agents = vec![
            agent("c", 1, Some(now - Duration::hours(1))),
            agent("b", 1, Some(now - Duration::hours(5))),
            agent("a", 1, None),
            agent("z", 2, Some(now)),
        ];
        agents.sort_by(compare_for_assignment);

        let order: Vec<&str> = agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "b", "c"]);
    }

    #[test]
    fn test_eligibility_falls_back_to_general() {
        let now = Utc::now();
        let mut billing = agent("a1", 0, None);
        billing.on_leave = true;
        let mut general = agent("a2", 0, None);
        general.categories = vec!["general".into()];

        let (category, eligible) =
            eligible_agents(&[billing.clone(), general.clone()], "billing", "general", now);
        assert_eq!(category, "general");
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, "a2");

        billing.on_leave = false;
        let (category, eligible) = eligible_agents(&[billing, general], "billing", "general", now);
        assert_eq!(category, "billing");
        assert_eq!(eligible[0].id, "a1");
    }

    #[tokio::test]
    async fn test_priority_strategy_picks_highest_priority() {
        let now = Utc::now();
        let ticket = Ticket::new("t1", "c1", "s", "billing");
        let eligible = vec![agent("a1", 1, None), agent("a2", 3, Some(now))];

        let picked = PriorityStrategy::new()
            .select_agent(&ticket, "billing", &eligible, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, "a2");

        let none = PriorityStrategy::new()
            .select_agent(&ticket, "billing", &[], now)
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
