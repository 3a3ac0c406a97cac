use thiserror::Error;

/// 工单引擎错误类型定义
#[derive(Debug, Error)]
pub enum HelpdeskError {
    #[error("未认证: {0}")]
    Unauthorized(String),

    #[error("无权访问: {0}")]
    Forbidden(String),

    #[error("{entity}未找到: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("并发冲突: {0}")]
    Conflict(String),

    #[error("外部服务错误: {0}")]
    ExternalService(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl HelpdeskError {
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn ticket_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "工单",
            id: id.to_string(),
        }
    }
    pub fn agent_not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound {
            entity: "坐席",
            id: id.into(),
        }
    }
    pub fn category_not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound {
            entity: "工单分类",
            id: name.into(),
        }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn external<S: Into<String>>(msg: S) -> Self {
        Self::ExternalService(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HelpdeskError::Database(_) | HelpdeskError::ExternalService(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            HelpdeskError::Unauthorized(_) => "请先登录",
            HelpdeskError::Forbidden(_) => "您没有执行此操作的权限",
            HelpdeskError::NotFound { .. } => "请求的资源不存在",
            HelpdeskError::Validation(_) => "输入数据验证失败",
            HelpdeskError::Conflict(_) => "资源已被其他请求修改，请刷新后重试",
            HelpdeskError::ExternalService(_) => "外部服务暂不可用，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(err: serde_json::Error) -> Self {
        HelpdeskError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for HelpdeskError {
    fn from(err: anyhow::Error) -> Self {
        HelpdeskError::Internal(err.to_string())
    }
}

/// 统一的Result类型
pub type HelpdeskResult<T> = std::result::Result<T, HelpdeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HelpdeskError::ticket_not_found(42);
        assert_eq!(err.to_string(), "工单未找到: 42");

        let err = HelpdeskError::conflict("工单已被分配");
        assert_eq!(err.to_string(), "并发冲突: 工单已被分配");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(HelpdeskError::external("notifier down").is_retryable());
        assert!(!HelpdeskError::validation_error("bad").is_retryable());
        assert!(!HelpdeskError::forbidden("tenant").is_retryable());
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            HelpdeskError::forbidden("x").user_message(),
            "您没有执行此操作的权限"
        );
        assert_eq!(
            HelpdeskError::Internal("boom".into()).user_message(),
            "系统繁忙，请稍后重试"
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: HelpdeskError = json_err.into();
        assert!(matches!(err, HelpdeskError::Serialization(_)));
    }
}
