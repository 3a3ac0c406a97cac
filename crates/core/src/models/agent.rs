use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 坐席休假区间（按自然日，首尾均包含）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HolidayWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl HolidayWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.from <= day && day <= self.to
    }
}

/// 坐席信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub is_active: bool,
    pub on_leave: bool,
    pub holidays: Vec<HolidayWindow>,
    pub categories: Vec<String>,
    pub priority: i32,
    pub is_online: bool,
    pub is_busy: bool,
    pub last_call_at: Option<DateTime<Utc>>,
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: impl Into<String>, tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            is_active: true,
            on_leave: false,
            holidays: Vec::new(),
            categories: Vec::new(),
            priority: 0,
            is_online: false,
            is_busy: false,
            last_call_at: None,
            last_assigned_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_on_holiday(&self, now: DateTime<Utc>) -> bool {
        self.holidays.iter().any(|h| h.contains(now))
    }

    /// 可用性判断：在职、未请假、不在休假区间内
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.on_leave && !self.is_on_holiday(now)
    }

    pub fn serves(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// 工单分配的资格判断
    pub fn is_eligible_for(&self, category: &str, now: DateTime<Utc>) -> bool {
        self.is_available(now) && self.serves(category)
    }

    /// 来电分配的资格判断
    pub fn can_take_call(&self, category: &str) -> bool {
        self.is_online && !self.is_busy && self.serves(category)
    }

    /// 不可用原因，可用时返回 `None`
    pub fn unavailability(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if !self.is_active {
            Some("inactive")
        } else if self.on_leave {
            Some("on_leave")
        } else if self.is_on_holiday(now) {
            Some("holiday")
        } else {
            None
        }
    }
}

/// 客户专属坐席池，作为轮询的路由主体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidatePool {
    pub tenant_id: String,
    pub customer_id: String,
    pub agent_ids: Vec<String>,
}

/// 轮询指针，带版本号，只能通过CAS更新
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotationPointer {
    pub subject_key: String,
    pub last_index: i64,
    pub version: i64,
}

impl RotationPointer {
    pub fn initial(subject_key: impl Into<String>) -> Self {
        Self {
            subject_key: subject_key.into(),
            last_index: 0,
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_holiday_window_is_inclusive() {
        let window = HolidayWindow::new(day(2024, 3, 1), day(2024, 3, 3));
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 3, 23, 59, 59).unwrap();

        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(end + Duration::seconds(1)));
        assert!(!window.contains(start - Duration::seconds(1)));
    }

    #[test]
    fn test_availability_predicate() {
        let now = Utc::now();
        let mut agent = Agent::new("a1", "t1", "Alice");
        assert!(agent.is_available(now));
        assert_eq!(agent.unavailability(now), None);

        agent.holidays.push(HolidayWindow::new(
            now.date_naive(),
            now.date_naive(),
        ));
        assert!(!agent.is_available(now));
        assert_eq!(agent.unavailability(now), Some("holiday"));

        agent.holidays.clear();
        agent.on_leave = true;
        assert!(!agent.is_available(now));

        agent.on_leave = false;
        agent.is_active = false;
        assert_eq!(agent.unavailability(now), Some("inactive"));
    }

    #[test]
    fn test_call_predicate() {
        let mut agent = Agent::new("a1", "t1", "Alice");
        agent.categories = vec!["billing".into()];
        assert!(!agent.can_take_call("billing"));

        agent.is_online = true;
        assert!(agent.can_take_call("billing"));
        assert!(!agent.can_take_call("general"));

        agent.is_busy = true;
        assert!(!agent.can_take_call("billing"));
    }
}
