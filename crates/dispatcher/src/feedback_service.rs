use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use helpdesk_core::{
    models::{Feedback, Notification, NotificationType, Principal, Role, Sentiment},
    FeedbackRepository, HelpdeskError, HelpdeskResult, TicketRepository,
};

use crate::notification_dispatcher::NotificationDispatcher;

/// 满意度反馈
pub struct FeedbackService {
    ticket_repo: Arc<dyn TicketRepository>,
    feedback_repo: Arc<dyn FeedbackRepository>,
    notifications: NotificationDispatcher,
}

impl FeedbackService {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        feedback_repo: Arc<dyn FeedbackRepository>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            ticket_repo,
            feedback_repo,
            notifications,
        }
    }

    /// 客户对已关闭的工单评分，每个工单只能评一次
    pub async fn submit(
        &self,
        principal: &Principal,
        ticket_id: i64,
        rating: u8,
        comment: Option<String>,
    ) -> HelpdeskResult<Feedback> {
        principal.require_role(&[Role::Customer])?;

        if !(1..=5).contains(&rating) {
            return Err(HelpdeskError::validation_error(format!(
                "评分必须在1到5之间: {rating}"
            )));
        }

        let ticket = self
            .ticket_repo
            .get_by_id(ticket_id)
            .await?
            .ok_or_else(|| HelpdeskError::ticket_not_found(ticket_id))?;
        principal.ensure_tenant(&ticket.tenant_id)?;

        if ticket.customer_id != principal.user_id {
            return Err(HelpdeskError::forbidden(format!(
                "只有工单 #{ticket_id} 的提交人可以评分"
            )));
        }
        if !ticket.is_closed() {
            return Err(HelpdeskError::validation_error(format!(
                "工单 #{ticket_id} 尚未关闭"
            )));
        }

        let feedback = Feedback {
            id: 0,
            ticket_id,
            tenant_id: ticket.tenant_id.clone(),
            customer_id: principal.user_id.clone(),
            agent_id: ticket.agent_id.clone(),
            rating,
            comment: comment.filter(|c| !c.trim().is_empty()),
            sentiment: Sentiment::from_rating(rating),
            created_at: Utc::now(),
        };
        let created = self.feedback_repo.create(&feedback).await?;

        info!(
            "工单 #{} 收到评分 {} ({})",
            ticket_id, created.rating, created.sentiment
        );

        if let Some(agent_id) = &created.agent_id {
            self.notifications.dispatch(Notification::new(
                &created.tenant_id,
                agent_id,
                NotificationType::FeedbackReceived,
                Some(ticket_id),
                format!("工单 #{} 收到客户评分: {} 星", ticket_id, created.rating),
            ));
        }

        Ok(created)
    }
}
