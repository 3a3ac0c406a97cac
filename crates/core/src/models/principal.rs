use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{HelpdeskError, HelpdeskResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {s}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已认证的调用方，所有操作都以其租户为边界
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub tenant_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 跨租户访问一律返回 Forbidden
    pub fn ensure_tenant(&self, tenant_id: &str) -> HelpdeskResult<()> {
        if self.tenant_id == tenant_id {
            Ok(())
        } else {
            Err(HelpdeskError::forbidden(format!(
                "用户 {} 无权访问租户 {} 的数据",
                self.user_id, tenant_id
            )))
        }
    }

    pub fn require_role(&self, allowed: &[Role]) -> HelpdeskResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(HelpdeskError::forbidden(format!(
                "角色 {} 无权执行该操作",
                self.role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_tenant_is_forbidden() {
        let principal = Principal::new("u1", "t1", Role::Agent);
        assert!(principal.ensure_tenant("t1").is_ok());
        assert!(matches!(
            principal.ensure_tenant("t2"),
            Err(HelpdeskError::Forbidden(_))
        ));
    }

    #[test]
    fn test_require_role() {
        let customer = Principal::new("c1", "t1", Role::Customer);
        assert!(customer.require_role(&[Role::Customer]).is_ok());
        assert!(customer.require_role(&[Role::Agent, Role::Admin]).is_err());
    }
}
