use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::impl_sqlite_text_enum;
use super::ticket::TicketPriority;

/// SLA规则，priority 为空时作为租户默认规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaRule {
    pub id: i64,
    pub tenant_id: String,
    pub priority: Option<TicketPriority>,
    pub response_hours: f64,
    pub resolution_hours: f64,
}

impl SlaRule {
    pub fn is_tenant_default(&self) -> bool {
        self.priority.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BreachKind {
    Response,
    Resolution,
}

impl BreachKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreachKind::Response => "response",
            BreachKind::Resolution => "resolution",
        }
    }
}

impl FromStr for BreachKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "response" => Ok(BreachKind::Response),
            "resolution" => Ok(BreachKind::Resolution),
            _ => Err(format!("Invalid breach kind: {s}")),
        }
    }
}

impl fmt::Display for BreachKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(BreachKind);

/// 违约通知的去重标记
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaBreachMarker {
    pub ticket_id: i64,
    pub kind: BreachKind,
    pub rule_id: i64,
    pub notified_at: DateTime<Utc>,
}

/// 单个工单的SLA检查结果，只读
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaReport {
    pub ticket_id: i64,
    pub tenant_id: String,
    pub agent_id: Option<String>,
    pub rule_id: i64,
    pub elapsed_hours: f64,
    pub first_response_hours: Option<f64>,
    pub response_breach: bool,
    pub resolution_breach: bool,
}

impl SlaReport {
    pub fn has_breach(&self) -> bool {
        self.response_breach || self.resolution_breach
    }

    pub fn breaches(&self) -> Vec<BreachKind> {
        let mut kinds = Vec::new();
        if self.response_breach {
            kinds.push(BreachKind::Response);
        }
        if self.resolution_breach {
            kinds.push(BreachKind::Resolution);
        }
        kinds
    }
}
