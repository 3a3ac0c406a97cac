//! 内存存储
//!
//! 实现全部仓储接口，条件写入语义与 SQLite 实现一致。
//! 所有集合放在同一把锁下，单个方法内的检查与写入是原子的。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helpdesk_core::{
    models::{
        Agent, BreachKind, CandidatePool, Category, Feedback, Notification, ReassignmentLog,
        RotationPointer, SlaBreachMarker, SlaRule, Ticket, TicketFilter, TicketMessage,
        TicketPriority, TicketStatus,
    },
    AgentRepository, BreachMarkerRepository, CandidatePoolRepository, CategoryRepository,
    FeedbackRepository, HelpdeskError, HelpdeskResult, NotificationRepository,
    ReassignmentLogRepository, RotationRepository, SlaRuleRepository, TicketRepository,
};
use tokio::sync::Mutex;

#[derive(Default)]
struct StoreState {
    tickets: BTreeMap<i64, Ticket>,
    next_ticket_id: i64,
    agents: BTreeMap<String, Agent>,
    rotation: HashMap<String, RotationPointer>,
    pools: HashMap<(String, String), CandidatePool>,
    logs: Vec<ReassignmentLog>,
    notifications: Vec<Notification>,
    sla_rules: Vec<SlaRule>,
    markers: HashMap<(i64, BreachKind, i64), SlaBreachMarker>,
    categories: Vec<Category>,
    next_category_id: i64,
    feedback: BTreeMap<i64, Feedback>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ticket_count(&self) -> usize {
        self.state.lock().await.tickets.len()
    }

    pub async fn notification_count(&self) -> usize {
        self.state.lock().await.notifications.len()
    }
}

fn sorted_by_creation(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
    tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    tickets
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn create(&self, ticket: &Ticket) -> HelpdeskResult<Ticket> {
        let mut state = self.state.lock().await;
        state.next_ticket_id += 1;
        let mut created = ticket.clone();
        created.id = state.next_ticket_id;
        state.tickets.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> HelpdeskResult<Option<Ticket>> {
        Ok(self.state.lock().await.tickets.get(&id).cloned())
    }

    async fn list(&self, filter: &TicketFilter) -> HelpdeskResult<Vec<Ticket>> {
        let state = self.state.lock().await;
        let tickets = state
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        Ok(sorted_by_creation(tickets))
    }

    async fn list_pending_assigned(&self) -> HelpdeskResult<Vec<Ticket>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .values()
            .filter(|t| t.status.is_pending() && t.agent_id.is_some())
            .cloned()
            .collect())
    }

    async fn list_for_sla(&self, closed_since: DateTime<Utc>) -> HelpdeskResult<Vec<Ticket>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .values()
            .filter(|t| !t.is_closed() || t.closed_at.map(|at| at >= closed_since).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn list_idle_pending(&self, cutoff: DateTime<Utc>) -> HelpdeskResult<Vec<Ticket>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .values()
            .filter(|t| t.is_idle_since(cutoff))
            .cloned()
            .collect())
    }

    async fn assign_if_unassigned(
        &self,
        id: i64,
        agent_id: &str,
        priority: TicketPriority,
        sla_due: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        match state.tickets.get_mut(&id) {
            Some(ticket) if ticket.agent_id.is_none() && ticket.status == TicketStatus::Open => {
                ticket.agent_id = Some(agent_id.to_string());
                ticket.priority = priority;
                ticket.status = TicketStatus::Assigned;
                ticket.sla_due = Some(sla_due);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reassign_with_log(
        &self,
        id: i64,
        expected_agent: Option<&str>,
        log: &ReassignmentLog,
    ) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        let applied = match state.tickets.get_mut(&id) {
            Some(ticket)
                if ticket.agent_id.as_deref() == expected_agent && ticket.status.is_pending() =>
            {
                ticket.agent_id = Some(log.to_agent.clone());
                true
            }
            _ => false,
        };

        if applied {
            let mut entry = log.clone();
            entry.id = state.logs.len() as i64 + 1;
            entry.ticket_id = id;
            state.logs.push(entry);
        }
        Ok(applied)
    }

    async fn update_status(
        &self,
        id: i64,
        expected: TicketStatus,
        next: TicketStatus,
        at: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        match state.tickets.get_mut(&id) {
            Some(ticket) if ticket.status == expected => {
                ticket.status = next;
                if next == TicketStatus::Closed {
                    ticket.closed_at = Some(at);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close_if_idle(
        &self,
        id: i64,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        match state.tickets.get_mut(&id) {
            Some(ticket) if ticket.is_idle_since(cutoff) => {
                ticket.status = TicketStatus::Closed;
                ticket.auto_closed = true;
                ticket.closed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_message(
        &self,
        id: i64,
        message: &TicketMessage,
        from_agent: bool,
    ) -> HelpdeskResult<()> {
        let mut state = self.state.lock().await;
        let ticket = state
            .tickets
            .get_mut(&id)
            .ok_or_else(|| HelpdeskError::ticket_not_found(id))?;

        if from_agent {
            ticket.last_agent_reply_at = Some(message.created_at);
        } else {
            ticket.last_customer_reply_at = Some(message.created_at);
        }
        ticket.messages.push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl AgentRepository for InMemoryStore {
    async fn upsert(&self, agent: &Agent) -> HelpdeskResult<()> {
        let mut state = self.state.lock().await;
        match state.agents.get_mut(&agent.id) {
            Some(existing) => {
                existing.name = agent.name.clone();
                existing.is_active = agent.is_active;
                existing.on_leave = agent.on_leave;
                existing.holidays = agent.holidays.clone();
                existing.categories = agent.categories.clone();
                existing.priority = agent.priority;
                existing.is_online = agent.is_online;
            }
            None => {
                state.agents.insert(agent.id.clone(), agent.clone());
            }
        }
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> HelpdeskResult<Option<Agent>> {
        Ok(self.state.lock().await.agents.get(id).cloned())
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<Agent>> {
        let state = self.state.lock().await;
        Ok(state
            .agents
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn touch_last_assigned(&self, id: &str, at: DateTime<Utc>) -> HelpdeskResult<()> {
        if let Some(agent) = self.state.lock().await.agents.get_mut(id) {
            agent.last_assigned_at = Some(at);
        }
        Ok(())
    }

    async fn try_mark_busy(
        &self,
        id: &str,
        category: &str,
        at: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        match state.agents.get_mut(id) {
            Some(agent) if agent.can_take_call(category) => {
                agent.is_busy = true;
                agent.last_call_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: &str) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        match state.agents.get_mut(id) {
            Some(agent) if agent.is_busy => {
                agent.is_busy = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RotationRepository for InMemoryStore {
    async fn get(&self, subject_key: &str) -> HelpdeskResult<Option<RotationPointer>> {
        Ok(self.state.lock().await.rotation.get(subject_key).cloned())
    }

    async fn compare_and_set(
        &self,
        subject_key: &str,
        expected_version: i64,
        last_index: i64,
    ) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        let current_version = state
            .rotation
            .get(subject_key)
            .map(|p| p.version)
            .unwrap_or(0);

        if current_version != expected_version {
            return Ok(false);
        }

        state.rotation.insert(
            subject_key.to_string(),
            RotationPointer {
                subject_key: subject_key.to_string(),
                last_index,
                version: expected_version + 1,
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl CandidatePoolRepository for InMemoryStore {
    async fn get(
        &self,
        tenant_id: &str,
        customer_id: &str,
    ) -> HelpdeskResult<Option<CandidatePool>> {
        let key = (tenant_id.to_string(), customer_id.to_string());
        Ok(self.state.lock().await.pools.get(&key).cloned())
    }

    async fn upsert(&self, pool: &CandidatePool) -> HelpdeskResult<()> {
        let key = (pool.tenant_id.clone(), pool.customer_id.clone());
        self.state.lock().await.pools.insert(key, pool.clone());
        Ok(())
    }
}

#[async_trait]
impl ReassignmentLogRepository for InMemoryStore {
    async fn list_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Vec<ReassignmentLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<ReassignmentLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn create(&self, notification: &Notification) -> HelpdeskResult<()> {
        self.state
            .lock()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn list_by_recipient(
        &self,
        tenant_id: &str,
        recipient_id: &str,
    ) -> HelpdeskResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut items: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.tenant_id == tenant_id && n.recipient_id == recipient_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn mark_read(&self, id: &str) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SlaRuleRepository for InMemoryStore {
    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<SlaRule>> {
        let state = self.state.lock().await;
        Ok(state
            .sla_rules
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create(&self, rule: &SlaRule) -> HelpdeskResult<SlaRule> {
        let mut state = self.state.lock().await;
        let mut created = rule.clone();
        created.id = state.sla_rules.len() as i64 + 1;
        state.sla_rules.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl BreachMarkerRepository for InMemoryStore {
    async fn try_mark(&self, marker: &SlaBreachMarker) -> HelpdeskResult<bool> {
        let mut state = self.state.lock().await;
        let key = (marker.ticket_id, marker.kind, marker.rule_id);
        if state.markers.contains_key(&key) {
            return Ok(false);
        }
        state.markers.insert(key, marker.clone());
        Ok(true)
    }

    async fn unmark(&self, marker: &SlaBreachMarker) -> HelpdeskResult<()> {
        self.state
            .lock()
            .await
            .markers
            .remove(&(marker.ticket_id, marker.kind, marker.rule_id));
        Ok(())
    }

    async fn list_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Vec<SlaBreachMarker>> {
        let state = self.state.lock().await;
        Ok(state
            .markers
            .values()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut items: Vec<Category> = state
            .categories
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn get_by_name(&self, tenant_id: &str, name: &str) -> HelpdeskResult<Option<Category>> {
        let state = self.state.lock().await;
        Ok(state
            .categories
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.name == name)
            .cloned())
    }

    async fn create(&self, category: &Category) -> HelpdeskResult<Category> {
        let mut state = self.state.lock().await;
        if state
            .categories
            .iter()
            .any(|c| c.tenant_id == category.tenant_id && c.name == category.name)
        {
            return Err(HelpdeskError::conflict(format!(
                "分类已存在: {}/{}",
                category.tenant_id, category.name
            )));
        }
        state.next_category_id += 1;
        let mut created = category.clone();
        created.id = state.next_category_id;
        state.categories.push(created.clone());
        Ok(created)
    }

    async fn delete_with_fallback(
        &self,
        tenant_id: &str,
        name: &str,
        fallback: &str,
    ) -> HelpdeskResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.categories.len();
        state
            .categories
            .retain(|c| !(c.tenant_id == tenant_id && c.name == name));
        if state.categories.len() == before {
            return Err(HelpdeskError::category_not_found(name));
        }

        let mut moved = 0;
        for ticket in state.tickets.values_mut() {
            if ticket.tenant_id == tenant_id && ticket.category == name {
                ticket.category = fallback.to_string();
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryStore {
    async fn create(&self, feedback: &Feedback) -> HelpdeskResult<Feedback> {
        let mut state = self.state.lock().await;
        if state.feedback.contains_key(&feedback.ticket_id) {
            return Err(HelpdeskError::conflict(format!(
                "工单 {} 已提交过满意度反馈",
                feedback.ticket_id
            )));
        }
        let mut created = feedback.clone();
        created.id = state.feedback.len() as i64 + 1;
        state.feedback.insert(created.ticket_id, created.clone());
        Ok(created)
    }

    async fn get_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Option<Feedback>> {
        Ok(self.state.lock().await.feedback.get(&ticket_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rotation_cas_rejects_stale_version() {
        let store = InMemoryStore::new();
        assert!(store.compare_and_set("queue:t1:general", 0, 1).await.unwrap());
        // 同一版本第二次写入失败
        assert!(!store.compare_and_set("queue:t1:general", 0, 2).await.unwrap());

        let pointer = RotationRepository::get(&store, "queue:t1:general")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pointer.last_index, 1);
        assert_eq!(pointer.version, 1);

        assert!(store.compare_and_set("queue:t1:general", 1, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_assign_is_conditional() {
        let store = InMemoryStore::new();
        let ticket = TicketRepository::create(&store, &Ticket::new("t1", "c1", "s", "general"))
            .await
            .unwrap();

        let due = Utc::now();
        assert!(store
            .assign_if_unassigned(ticket.id, "a1", TicketPriority::High, due)
            .await
            .unwrap());
        assert!(!store
            .assign_if_unassigned(ticket.id, "a2", TicketPriority::High, due)
            .await
            .unwrap());

        let stored = TicketRepository::get_by_id(&store, ticket.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.agent_id.as_deref(), Some("a1"));
        assert_eq!(stored.status, TicketStatus::Assigned);
    }

    #[tokio::test]
    async fn test_agent_upsert_keeps_runtime_state() {
        let store = InMemoryStore::new();
        let mut agent = Agent::new("a1", "t1", "Alice");
        agent.categories = vec!["sales".into()];
        agent.is_online = true;
        AgentRepository::upsert(&store, &agent).await.unwrap();

        let now = Utc::now();
        assert!(store.try_mark_busy("a1", "sales", now).await.unwrap());

        // 使用忙碌之前读取的旧数据更新资料
        agent.priority = 5;
        AgentRepository::upsert(&store, &agent).await.unwrap();

        let stored = AgentRepository::get_by_id(&store, "a1").await.unwrap().unwrap();
        assert_eq!(stored.priority, 5);
        assert!(stored.is_busy);
        assert!(stored.last_call_at.is_some());
    }
}
