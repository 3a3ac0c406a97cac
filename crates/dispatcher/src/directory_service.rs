use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use helpdesk_core::{
    models::{
        category::normalize_name, Agent, CandidatePool, HolidayWindow, Notification, Principal,
        ReassignmentLog, Role, SlaRule,
    },
    AgentRepository, CandidatePoolRepository, HelpdeskError, HelpdeskResult,
    NotificationRepository, ReassignmentLogRepository, SlaRuleRepository, TicketRepository,
};

/// 坐席资料，只包含管理员可编辑的字段，租户取自调用方
#[derive(Debug, Clone, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub on_leave: bool,
    #[serde(default)]
    pub holidays: Vec<HolidayWindow>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_online: bool,
}

fn default_true() -> bool {
    true
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
            on_leave: false,
            holidays: Vec::new(),
            categories: Vec::new(),
            priority: 0,
            is_online: false,
        }
    }

    fn apply_to(self, agent: &mut Agent) {
        agent.name = self.name;
        agent.is_active = self.is_active;
        agent.on_leave = self.on_leave;
        agent.holidays = self.holidays;
        agent.categories = self
            .categories
            .iter()
            .map(|c| normalize_name(c))
            .filter(|c| !c.is_empty())
            .collect();
        agent.priority = self.priority;
        agent.is_online = self.is_online;
    }
}

/// 坐席目录、客户坐席池、SLA规则与站内通知的管理入口
pub struct DirectoryService {
    agent_repo: Arc<dyn AgentRepository>,
    pool_repo: Arc<dyn CandidatePoolRepository>,
    sla_rule_repo: Arc<dyn SlaRuleRepository>,
    log_repo: Arc<dyn ReassignmentLogRepository>,
    ticket_repo: Arc<dyn TicketRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
}

impl DirectoryService {
    pub fn new(
        agent_repo: Arc<dyn AgentRepository>,
        pool_repo: Arc<dyn CandidatePoolRepository>,
        sla_rule_repo: Arc<dyn SlaRuleRepository>,
        log_repo: Arc<dyn ReassignmentLogRepository>,
        ticket_repo: Arc<dyn TicketRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            agent_repo,
            pool_repo,
            sla_rule_repo,
            log_repo,
            ticket_repo,
            notification_repo,
        }
    }

    /// 新增坐席或更新已有坐席的资料，忙碌标记与最后通话/分配时间由分配流程维护，这里不写入
    pub async fn upsert_agent(
        &self,
        principal: &Principal,
        profile: AgentProfile,
    ) -> HelpdeskResult<Agent> {
        principal.require_role(&[Role::Admin])?;

        if profile.id.trim().is_empty() {
            return Err(HelpdeskError::validation_error("坐席ID不能为空"));
        }
        if let Some(window) = profile.holidays.iter().find(|h| h.from > h.to) {
            return Err(HelpdeskError::validation_error(format!(
                "休假区间无效: {} ~ {}",
                window.from, window.to
            )));
        }

        let mut agent = match self.agent_repo.get_by_id(&profile.id).await? {
            Some(existing) => {
                principal.ensure_tenant(&existing.tenant_id)?;
                existing
            }
            None => Agent::new(&profile.id, &principal.tenant_id, &profile.name),
        };
        profile.apply_to(&mut agent);

        self.agent_repo.upsert(&agent).await?;
        info!("更新坐席信息: {} (租户: {})", agent.id, agent.tenant_id);

        // 返回存储中的最新状态，运行时字段可能在读取后被并发修改
        Ok(self
            .agent_repo
            .get_by_id(&agent.id)
            .await?
            .unwrap_or(agent))
    }

    pub async fn list_agents(&self, principal: &Principal) -> HelpdeskResult<Vec<Agent>> {
        principal.require_role(&[Role::Agent, Role::Admin])?;
        self.agent_repo.list_by_tenant(&principal.tenant_id).await
    }

    pub async fn set_candidate_pool(
        &self,
        principal: &Principal,
        customer_id: &str,
        agent_ids: Vec<String>,
    ) -> HelpdeskResult<CandidatePool> {
        principal.require_role(&[Role::Admin])?;

        for agent_id in &agent_ids {
            let agent = self
                .agent_repo
                .get_by_id(agent_id)
                .await?
                .ok_or_else(|| HelpdeskError::agent_not_found(agent_id))?;
            principal.ensure_tenant(&agent.tenant_id)?;
        }

        let pool = CandidatePool {
            tenant_id: principal.tenant_id.clone(),
            customer_id: customer_id.to_string(),
            agent_ids,
        };
        self.pool_repo.upsert(&pool).await?;
        Ok(pool)
    }

    pub async fn create_sla_rule(&self, principal: &Principal, rule: SlaRule) -> HelpdeskResult<SlaRule> {
        principal.require_role(&[Role::Admin])?;
        principal.ensure_tenant(&rule.tenant_id)?;

        if rule.response_hours <= 0.0 || rule.resolution_hours <= 0.0 {
            return Err(HelpdeskError::validation_error("SLA时限必须大于0"));
        }
        self.sla_rule_repo.create(&rule).await
    }

    pub async fn list_sla_rules(&self, principal: &Principal) -> HelpdeskResult<Vec<SlaRule>> {
        self.sla_rule_repo.list_by_tenant(&principal.tenant_id).await
    }

    pub async fn reassignment_history(
        &self,
        principal: &Principal,
        ticket_id: i64,
    ) -> HelpdeskResult<Vec<ReassignmentLog>> {
        principal.require_role(&[Role::Agent, Role::Admin])?;

        let ticket = self
            .ticket_repo
            .get_by_id(ticket_id)
            .await?
            .ok_or_else(|| HelpdeskError::ticket_not_found(ticket_id))?;
        principal.ensure_tenant(&ticket.tenant_id)?;

        self.log_repo.list_by_ticket(ticket_id).await
    }

    pub async fn inbox(&self, principal: &Principal) -> HelpdeskResult<Vec<Notification>> {
        self.notification_repo
            .list_by_recipient(&principal.tenant_id, &principal.user_id)
            .await
    }

    /// 只能标记自己收件箱中的通知
    pub async fn mark_read(&self, principal: &Principal, notification_id: &str) -> HelpdeskResult<()> {
        let owned = self
            .inbox(principal)
            .await?
            .iter()
            .any(|n| n.id == notification_id);
        if !owned {
            return Err(HelpdeskError::NotFound {
                entity: "通知",
                id: notification_id.to_string(),
            });
        }

        self.notification_repo.mark_read(notification_id).await?;
        Ok(())
    }
}
