//! 行映射工具
//!
//! SQLite 中时间字段以毫秒时间戳存储，列表字段以 JSON 文本存储。

use chrono::{DateTime, Utc};
use helpdesk_core::{HelpdeskError, HelpdeskResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn to_millis(at: DateTime<Utc>) -> i64 {
        at.timestamp_millis()
    }

    pub fn opt_to_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
        at.map(Self::to_millis)
    }

    pub fn from_millis(millis: i64) -> HelpdeskResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| HelpdeskError::Serialization(format!("无效的时间戳: {millis}")))
    }

    pub fn parse_timestamp(row: &SqliteRow, field_name: &str) -> HelpdeskResult<DateTime<Utc>> {
        let millis: i64 = row.try_get(field_name)?;
        Self::from_millis(millis)
    }

    pub fn parse_optional_timestamp(
        row: &SqliteRow,
        field_name: &str,
    ) -> HelpdeskResult<Option<DateTime<Utc>>> {
        let millis: Option<i64> = row.try_get(field_name)?;
        millis.map(Self::from_millis).transpose()
    }

    pub fn parse_json_list<T: DeserializeOwned>(
        row: &SqliteRow,
        field_name: &str,
    ) -> HelpdeskResult<Vec<T>> {
        match row.try_get::<Option<String>, _>(field_name)? {
            Some(json_str) if !json_str.is_empty() => serde_json::from_str(&json_str)
                .map_err(|e| HelpdeskError::Serialization(format!("解析字段 {field_name} 失败: {e}"))),
            _ => Ok(Vec::new()),
        }
    }

    pub fn to_json_list<T: Serialize>(items: &[T]) -> HelpdeskResult<String> {
        serde_json::to_string(items)
            .map_err(|e| HelpdeskError::Serialization(format!("序列化列表失败: {e}")))
    }

    /// 唯一约束冲突转换为 Conflict，其余保持数据库错误
    pub fn map_unique_violation(err: sqlx::Error, message: impl Into<String>) -> HelpdeskError {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                HelpdeskError::conflict(message)
            }
            _ => HelpdeskError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_millis_preserve_precision() {
        let at = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let millis = MappingHelpers::to_millis(at);
        assert_eq!(millis, 1_700_000_123_456);
        assert_eq!(MappingHelpers::from_millis(millis).unwrap(), at);
    }

    #[test]
    fn test_json_list_serialization() {
        let json = MappingHelpers::to_json_list(&["billing".to_string(), "general".to_string()])
            .unwrap();
        assert_eq!(json, r#"["billing","general"]"#);
    }
}
