use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::impl_sqlite_text_enum;

/// 每个租户都必须存在的兜底分类
pub const GENERAL_CATEGORY: &str = "general";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Default,
    Custom,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Default => "default",
            CategoryKind::Custom => "custom",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(CategoryKind::Default),
            "custom" => Ok(CategoryKind::Custom),
            _ => Err(format!("Invalid category kind: {s}")),
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(CategoryKind);

/// 租户的规范分类
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub kind: CategoryKind,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            id: 0,
            tenant_id: tenant_id.into(),
            name: normalize_name(&name.into()),
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.kind == CategoryKind::Default
    }
}

/// 分类名统一小写并去除首尾空白
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_name_is_normalized() {
        let category = Category::new("t1", "  Billing ", CategoryKind::Custom);
        assert_eq!(category.name, "billing");
        assert!(!category.is_default());
        assert!(Category::new("t1", GENERAL_CATEGORY, CategoryKind::Default).is_default());
    }
}
