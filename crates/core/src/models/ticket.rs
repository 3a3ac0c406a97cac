use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::impl_sqlite_text_enum;

/// 工单优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        }
    }

    /// 该优先级对应的SLA处理时限（小时）
    pub fn sla_hours(&self) -> i64 {
        match self {
            TicketPriority::Low => 48,
            TicketPriority::Medium => 24,
            TicketPriority::High => 8,
            TicketPriority::Critical => 1,
        }
    }

    /// 解析请求中的优先级，无法识别的值按 medium 处理
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    /// 从分配时间计算SLA截止时间
    pub fn sla_due(&self, assigned_at: DateTime<Utc>) -> DateTime<Utc> {
        assigned_at + Duration::hours(self.sla_hours())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "critical" => Ok(TicketPriority::Critical),
            other => Err(format!("Invalid ticket priority: {other}")),
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(TicketPriority);

/// 工单状态，只能单向前进
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "assigned")]
    Assigned,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "closed")]
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Assigned => "assigned",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Closed => "closed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TicketStatus::Open => 0,
            TicketStatus::Assigned => 1,
            TicketStatus::InProgress => 2,
            TicketStatus::Closed => 3,
        }
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        next.rank() > self.rank()
    }

    /// 仍处于待处理阶段（可被改派）
    pub fn is_pending(&self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::Assigned)
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "assigned" => Ok(TicketStatus::Assigned),
            "in-progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(format!("Invalid ticket status: {s}")),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(TicketStatus);

/// 工单消息，只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketMessage {
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub tenant_id: String,
    pub customer_id: String,
    pub agent_id: Option<String>,
    pub subject: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub sla_due: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub last_agent_reply_at: Option<DateTime<Utc>>,
    pub last_customer_reply_at: Option<DateTime<Utc>>,
    pub auto_closed: bool,
    pub messages: Vec<TicketMessage>,
}

impl Ticket {
    pub fn new(
        tenant_id: impl Into<String>,
        customer_id: impl Into<String>,
        subject: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: 0, // 将由存储层生成
            tenant_id: tenant_id.into(),
            customer_id: customer_id.into(),
            agent_id: None,
            subject: subject.into(),
            category: category.into(),
            priority: TicketPriority::Medium,
            status: TicketStatus::Open,
            sla_due: None,
            created_at: Utc::now(),
            closed_at: None,
            last_agent_reply_at: None,
            last_customer_reply_at: None,
            auto_closed: false,
            messages: Vec::new(),
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.agent_id.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Closed
    }

    /// 第一条非客户发送的消息时间
    pub fn first_agent_response_at(&self) -> Option<DateTime<Utc>> {
        self.messages
            .iter()
            .find(|m| m.sender_id != self.customer_id)
            .map(|m| m.created_at)
    }

    /// 坐席最后回复早于 cutoff 的待处理工单（open/assigned）视为闲置
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.status.is_pending()
            && self
                .last_agent_reply_at
                .map(|at| at < cutoff)
                .unwrap_or(false)
    }

    pub fn entity_description(&self) -> String {
        format!(
            "工单 #{} '{}' (租户: {}, 分类: {})",
            self.id, self.subject, self.tenant_id, self.category
        )
    }
}

/// 工单列表查询条件，租户必填
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub tenant_id: String,
    pub customer_id: Option<String>,
    pub agent_id: Option<String>,
    pub status: Option<TicketStatus>,
}

impl TicketFilter {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.tenant_id == self.tenant_id
            && self
                .customer_id
                .as_ref()
                .map_or(true, |c| &ticket.customer_id == c)
            && self
                .agent_id
                .as_ref()
                .map_or(true, |a| ticket.agent_id.as_ref() == Some(a))
            && self.status.map_or(true, |s| ticket.status == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sla_hours_per_priority() {
        assert_eq!(TicketPriority::Low.sla_hours(), 48);
        assert_eq!(TicketPriority::Medium.sla_hours(), 24);
        assert_eq!(TicketPriority::High.sla_hours(), 8);
        assert_eq!(TicketPriority::Critical.sla_hours(), 1);
    }

    #[test]
    fn test_unknown_priority_defaults_to_medium() {
        assert_eq!(TicketPriority::parse_or_default("urgent"), TicketPriority::Medium);
        assert_eq!(TicketPriority::parse_or_default(""), TicketPriority::Medium);
        assert_eq!(TicketPriority::parse_or_default(" HIGH "), TicketPriority::High);

        let assigned_at = Utc::now();
        let due = TicketPriority::parse_or_default("whatever").sla_due(assigned_at);
        assert_eq!(due - assigned_at, Duration::hours(24));
    }

    #[test]
    fn test_status_transitions_are_forward_only() {
        assert!(TicketStatus::Open.can_transition_to(TicketStatus::Assigned));
        assert!(TicketStatus::Open.can_transition_to(TicketStatus::Closed));
        assert!(TicketStatus::Assigned.can_transition_to(TicketStatus::InProgress));
        assert!(!TicketStatus::InProgress.can_transition_to(TicketStatus::Assigned));
        assert!(!TicketStatus::Closed.can_transition_to(TicketStatus::Open));
        assert!(!TicketStatus::Assigned.can_transition_to(TicketStatus::Assigned));
    }

    #[test]
    fn test_status_serde_uses_hyphenated_names() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!("in-progress".parse::<TicketStatus>().unwrap(), TicketStatus::InProgress);
    }

    #[test]
    fn test_first_agent_response_skips_customer_messages() {
        let created = Utc::now() - Duration::hours(5);
        let mut ticket = Ticket::new("t1", "cust-1", "printer", "hardware");
        ticket.created_at = created;
        ticket.messages.push(TicketMessage {
            sender_id: "cust-1".into(),
            text: "still broken".into(),
            created_at: created + Duration::hours(1),
        });
        assert!(ticket.first_agent_response_at().is_none());

        ticket.messages.push(TicketMessage {
            sender_id: "agent-7".into(),
            text: "on it".into(),
            created_at: created + Duration::hours(2),
        });
        assert_eq!(
            ticket.first_agent_response_at(),
            Some(created + Duration::hours(2))
        );
    }

    #[test]
    fn test_idle_detection_requires_pending_status_and_agent_reply() {
        let now = Utc::now();
        let cutoff = now - Duration::days(7);
        let mut ticket = Ticket::new("t1", "c1", "s", "general");
        assert!(!ticket.is_idle_since(cutoff));

        ticket.last_agent_reply_at = Some(now - Duration::days(8));
        assert!(ticket.is_idle_since(cutoff));

        ticket.status = TicketStatus::Assigned;
        assert!(ticket.is_idle_since(cutoff));

        ticket.status = TicketStatus::InProgress;
        assert!(!ticket.is_idle_since(cutoff));

        ticket.status = TicketStatus::Assigned;
        ticket.last_agent_reply_at = Some(now - Duration::days(1));
        assert!(!ticket.is_idle_since(cutoff));
    }

    #[test]
    fn test_filter_matches_tenant_and_owner() {
        let mut ticket = Ticket::new("t1", "c1", "s", "general");
        ticket.agent_id = Some("a1".into());

        assert!(TicketFilter::for_tenant("t1").matches(&ticket));
        assert!(!TicketFilter::for_tenant("t2").matches(&ticket));

        let mut by_agent = TicketFilter::for_tenant("t1");
        by_agent.agent_id = Some("a2".into());
        assert!(!by_agent.matches(&ticket));

        let mut by_customer = TicketFilter::for_tenant("t1");
        by_customer.customer_id = Some("c1".into());
        assert!(by_customer.matches(&ticket));
    }
}
