use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use helpdesk_core::{
    models::{
        category::normalize_name, Notification, NotificationType, Principal, ReassignmentLog,
        ReassignmentReason, Role, Ticket, TicketFilter, TicketMessage, TicketStatus, TriggeredBy,
    },
    AgentRepository, AiTextService, HelpdeskError, HelpdeskResult, TicketRepository,
};

use crate::category_service::CategoryService;
use crate::classification::CategoryClassifier;
use crate::notification_dispatcher::NotificationDispatcher;

/// 新建工单请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTicket {
    pub subject: String,
    /// 为空时由AI服务自动分类
    pub category: Option<String>,
    pub message: Option<String>,
    /// 坐席或管理员代客户建单时必填
    pub customer_id: Option<String>,
}

pub struct TicketService {
    ticket_repo: Arc<dyn TicketRepository>,
    agent_repo: Arc<dyn AgentRepository>,
    categories: Arc<CategoryService>,
    classifier: CategoryClassifier,
    ai: Arc<dyn AiTextService>,
    notifications: NotificationDispatcher,
}

impl TicketService {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        categories: Arc<CategoryService>,
        ai: Arc<dyn AiTextService>,
        notifications: NotificationDispatcher,
        fallback_category: impl Into<String>,
    ) -> Self {
        Self {
            ticket_repo,
            agent_repo,
            categories,
            classifier: CategoryClassifier::new(ai.clone(), fallback_category),
            ai,
            notifications,
        }
    }

    /// 工单查看权限：客户只能看自己的工单，坐席能看分配给自己的和未分配的
    fn ensure_can_view(principal: &Principal, ticket: &Ticket) -> HelpdeskResult<()> {
        principal.ensure_tenant(&ticket.tenant_id)?;

        let allowed = match principal.role {
            Role::Admin => true,
            Role::Customer => ticket.customer_id == principal.user_id,
            Role::Agent => ticket
                .agent_id
                .as_ref()
                .map_or(true, |agent| agent == &principal.user_id),
        };

        if allowed {
            Ok(())
        } else {
            Err(HelpdeskError::forbidden(format!(
                "用户 {} 无权访问工单 #{}",
                principal.user_id, ticket.id
            )))
        }
    }

    /// 坐席只能处理分配给自己的工单，管理员不受限
    fn ensure_can_handle(principal: &Principal, ticket: &Ticket) -> HelpdeskResult<()> {
        principal.require_role(&[Role::Agent, Role::Admin])?;
        principal.ensure_tenant(&ticket.tenant_id)?;

        if principal.role == Role::Agent && ticket.agent_id.as_deref() != Some(principal.user_id.as_str()) {
            return Err(HelpdeskError::forbidden(format!(
                "工单 #{} 未分配给坐席 {}",
                ticket.id, principal.user_id
            )));
        }
        Ok(())
    }

    async fn load(&self, ticket_id: i64) -> HelpdeskResult<Ticket> {
        self.ticket_repo
            .get_by_id(ticket_id)
            .await?
            .ok_or_else(|| HelpdeskError::ticket_not_found(ticket_id))
    }

    pub async fn create(&self, principal: &Principal, request: NewTicket) -> HelpdeskResult<Ticket> {
        let customer_id = match principal.role {
            Role::Customer => principal.user_id.clone(),
            Role::Agent | Role::Admin => request
                .customer_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| HelpdeskError::validation_error("代客户建单时必须指定客户"))?,
        };

        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(HelpdeskError::validation_error("工单标题不能为空"));
        }

        let canonical = self.categories.canonical_names(&principal.tenant_id).await?;
        let category = match request.category.as_deref() {
            Some(raw) => {
                let name = normalize_name(raw);
                if !canonical.contains(&name) {
                    return Err(HelpdeskError::validation_error(format!("未知的工单分类: {name}")));
                }
                name
            }
            None => {
                let text = match request.message.as_deref() {
                    Some(message) => format!("{subject}\n{message}"),
                    None => subject.to_string(),
                };
                self.classifier.classify(&text, &canonical).await
            }
        };

        let mut ticket = Ticket::new(&principal.tenant_id, &customer_id, subject, category);
        if let Some(text) = request.message.filter(|m| !m.trim().is_empty()) {
            ticket.messages.push(TicketMessage {
                sender_id: customer_id.clone(),
                text,
                created_at: ticket.created_at,
            });
            ticket.last_customer_reply_at = Some(ticket.created_at);
        }

        let created = self.ticket_repo.create(&ticket).await?;
        info!("新建工单: {}", created.entity_description());
        Ok(created)
    }

    pub async fn get(&self, principal: &Principal, ticket_id: i64) -> HelpdeskResult<Ticket> {
        let ticket = self.load(ticket_id).await?;
        Self::ensure_can_view(principal, &ticket)?;
        Ok(ticket)
    }

    /// 按角色限定范围：客户看自己的，坐席看自己的队列，管理员看全部，始终限定在本租户
    pub async fn list(
        &self,
        principal: &Principal,
        status: Option<TicketStatus>,
    ) -> HelpdeskResult<Vec<Ticket>> {
        let mut filter = TicketFilter::for_tenant(&principal.tenant_id);
        filter.status = status;
        match principal.role {
            Role::Customer => filter.customer_id = Some(principal.user_id.clone()),
            Role::Agent => filter.agent_id = Some(principal.user_id.clone()),
            Role::Admin => {}
        }

        self.ticket_repo.list(&filter).await
    }

    pub async fn append_message(
        &self,
        principal: &Principal,
        ticket_id: i64,
        text: &str,
    ) -> HelpdeskResult<Ticket> {
        if text.trim().is_empty() {
            return Err(HelpdeskError::validation_error("消息内容不能为空"));
        }

        let ticket = self.load(ticket_id).await?;
        let from_agent = principal.role != Role::Customer;
        if from_agent {
            Self::ensure_can_handle(principal, &ticket)?;
        } else {
            Self::ensure_can_view(principal, &ticket)?;
        }

        if ticket.is_closed() {
            return Err(HelpdeskError::validation_error(format!(
                "工单 #{ticket_id} 已关闭，不能追加消息"
            )));
        }

        let message = TicketMessage {
            sender_id: principal.user_id.clone(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.ticket_repo
            .append_message(ticket_id, &message, from_agent)
            .await?;

        debug!("工单 #{} 追加消息 (发送者: {})", ticket_id, principal.user_id);
        self.load(ticket_id).await
    }

    /// 状态只能向前推进，assigned 只能由分配引擎写入
    pub async fn change_status(
        &self,
        principal: &Principal,
        ticket_id: i64,
        next: TicketStatus,
    ) -> HelpdeskResult<Ticket> {
        let ticket = self.load(ticket_id).await?;
        Self::ensure_can_handle(principal, &ticket)?;

        if next == TicketStatus::Assigned {
            return Err(HelpdeskError::validation_error("请通过分配接口分配工单"));
        }
        if !ticket.status.can_transition_to(next) {
            return Err(HelpdeskError::validation_error(format!(
                "工单状态不能从 {} 变更为 {}",
                ticket.status, next
            )));
        }

        if !self
            .ticket_repo
            .update_status(ticket_id, ticket.status, next, Utc::now())
            .await?
        {
            return Err(HelpdeskError::conflict(format!(
                "工单 #{ticket_id} 状态已被其他请求修改"
            )));
        }

        info!("工单 #{} 状态变更: {} -> {}", ticket_id, ticket.status, next);
        self.load(ticket_id).await
    }

    /// 管理员手动改派
    pub async fn reassign(
        &self,
        principal: &Principal,
        ticket_id: i64,
        to_agent: &str,
        reason: ReassignmentReason,
    ) -> HelpdeskResult<Ticket> {
        principal.require_role(&[Role::Admin])?;

        let ticket = self.load(ticket_id).await?;
        principal.ensure_tenant(&ticket.tenant_id)?;

        let Some(current) = ticket.agent_id.clone() else {
            return Err(HelpdeskError::validation_error(format!(
                "工单 #{ticket_id} 尚未分配，请使用分配接口"
            )));
        };
        if !ticket.status.is_pending() {
            return Err(HelpdeskError::validation_error(format!(
                "工单 #{ticket_id} 状态为 {}，不能改派",
                ticket.status
            )));
        }
        if current == to_agent {
            return Err(HelpdeskError::validation_error(format!(
                "坐席 {to_agent} 已是工单 #{ticket_id} 的负责人"
            )));
        }

        let target = self
            .agent_repo
            .get_by_id(to_agent)
            .await?
            .ok_or_else(|| HelpdeskError::agent_not_found(to_agent))?;
        principal.ensure_tenant(&target.tenant_id)?;

        let log = ReassignmentLog::new(
            &ticket.tenant_id,
            ticket_id,
            Some(current.clone()),
            &target.id,
            reason,
            TriggeredBy::Admin,
            Utc::now(),
        );
        if !self
            .ticket_repo
            .reassign_with_log(ticket_id, Some(&current), &log)
            .await?
        {
            return Err(HelpdeskError::conflict(format!(
                "工单 #{ticket_id} 负责人已被其他请求修改"
            )));
        }

        info!(
            "管理员 {} 将工单 #{} 从 {} 改派给 {} (原因: {})",
            principal.user_id, ticket_id, current, target.id, reason
        );
        self.notifications.dispatch(Notification::new(
            &ticket.tenant_id,
            &target.id,
            NotificationType::TicketReassigned,
            Some(ticket_id),
            format!("工单 #{} '{}' 已改派给您", ticket_id, ticket.subject),
        ));

        self.load(ticket_id).await
    }

    fn conversation(ticket: &Ticket) -> String {
        let mut text = ticket.subject.clone();
        for message in &ticket.messages {
            text.push('\n');
            text.push_str(&message.text);
        }
        text
    }

    pub async fn summarize(&self, principal: &Principal, ticket_id: i64) -> HelpdeskResult<String> {
        let ticket = self.get(principal, ticket_id).await?;
        self.ai.summarize(&Self::conversation(&ticket)).await
    }

    pub async fn suggest_reply(&self, principal: &Principal, ticket_id: i64) -> HelpdeskResult<String> {
        let ticket = self.load(ticket_id).await?;
        Self::ensure_can_handle(principal, &ticket)?;
        self.ai.suggest_reply(&Self::conversation(&ticket)).await
    }
}
