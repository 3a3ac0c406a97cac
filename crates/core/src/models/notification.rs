use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::impl_sqlite_text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TicketAssigned,
    TicketReassigned,
    SlaBreach,
    FeedbackRequest,
    FeedbackReceived,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::TicketAssigned => "ticket_assigned",
            NotificationType::TicketReassigned => "ticket_reassigned",
            NotificationType::SlaBreach => "sla_breach",
            NotificationType::FeedbackRequest => "feedback_request",
            NotificationType::FeedbackReceived => "feedback_received",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticket_assigned" => Ok(NotificationType::TicketAssigned),
            "ticket_reassigned" => Ok(NotificationType::TicketReassigned),
            "sla_breach" => Ok(NotificationType::SlaBreach),
            "feedback_request" => Ok(NotificationType::FeedbackRequest),
            "feedback_received" => Ok(NotificationType::FeedbackReceived),
            _ => Err(format!("Invalid notification type: {s}")),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(NotificationType);

/// 站内通知
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub tenant_id: String,
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub ticket_id: Option<i64>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tenant_id: impl Into<String>,
        recipient_id: impl Into<String>,
        notification_type: NotificationType,
        ticket_id: Option<i64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            recipient_id: recipient_id.into(),
            notification_type,
            ticket_id,
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}
