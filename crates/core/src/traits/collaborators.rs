use async_trait::async_trait;

use crate::errors::HelpdeskResult;

/// 外部通知通道（邮件、IM 等）
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient_id: &str,
        ticket_id: Option<i64>,
        template: &str,
    ) -> HelpdeskResult<()>;

    fn name(&self) -> &str;
}

/// 外部AI文本服务
#[async_trait]
pub trait AiTextService: Send + Sync {
    async fn summarize(&self, text: &str) -> HelpdeskResult<String>;

    /// 返回值未经校验，调用方必须对照租户的规范分类集合
    async fn classify(&self, text: &str, allowed_categories: &[String]) -> HelpdeskResult<String>;

    async fn suggest_reply(&self, text: &str) -> HelpdeskResult<String>;
}
