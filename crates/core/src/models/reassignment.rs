use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::impl_sqlite_text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReassignmentReason {
    #[serde(rename = "LEAVE")]
    Leave,
    #[serde(rename = "HOLIDAY")]
    Holiday,
    #[serde(rename = "SICK")]
    Sick,
    #[serde(rename = "INACTIVE")]
    Inactive,
    #[serde(rename = "AUTO_ROTATION")]
    AutoRotation,
}

impl ReassignmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReassignmentReason::Leave => "LEAVE",
            ReassignmentReason::Holiday => "HOLIDAY",
            ReassignmentReason::Sick => "SICK",
            ReassignmentReason::Inactive => "INACTIVE",
            ReassignmentReason::AutoRotation => "AUTO_ROTATION",
        }
    }
}

impl FromStr for ReassignmentReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEAVE" => Ok(ReassignmentReason::Leave),
            "HOLIDAY" => Ok(ReassignmentReason::Holiday),
            "SICK" => Ok(ReassignmentReason::Sick),
            "INACTIVE" => Ok(ReassignmentReason::Inactive),
            "AUTO_ROTATION" => Ok(ReassignmentReason::AutoRotation),
            _ => Err(format!("Invalid reassignment reason: {s}")),
        }
    }
}

impl fmt::Display for ReassignmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(ReassignmentReason);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TriggeredBy {
    #[serde(rename = "CRON")]
    Cron,
    #[serde(rename = "SYSTEM")]
    System,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::Cron => "CRON",
            TriggeredBy::System => "SYSTEM",
            TriggeredBy::Admin => "ADMIN",
        }
    }
}

impl FromStr for TriggeredBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRON" => Ok(TriggeredBy::Cron),
            "SYSTEM" => Ok(TriggeredBy::System),
            "ADMIN" => Ok(TriggeredBy::Admin),
            _ => Err(format!("Invalid trigger source: {s}")),
        }
    }
}

impl_sqlite_text_enum!(TriggeredBy);

/// 改派记录，只追加
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReassignmentLog {
    pub id: i64,
    pub tenant_id: String,
    pub ticket_id: i64,
    pub from_agent: Option<String>,
    pub to_agent: String,
    pub reason: ReassignmentReason,
    pub triggered_by: TriggeredBy,
    pub reassigned_at: DateTime<Utc>,
}

impl ReassignmentLog {
    pub fn new(
        tenant_id: impl Into<String>,
        ticket_id: i64,
        from_agent: Option<String>,
        to_agent: impl Into<String>,
        reason: ReassignmentReason,
        triggered_by: TriggeredBy,
        reassigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            tenant_id: tenant_id.into(),
            ticket_id,
            from_agent,
            to_agent: to_agent.into(),
            reason,
            triggered_by,
            reassigned_at,
        }
    }
}
