//! 数据仓储层接口定义
//!
//! 所有会被并发修改的共享状态（工单的 agent/status、坐席忙碌标记、轮询指针）
//! 只通过条件写入更新：方法返回 `bool` 表示条件是否仍成立、写入是否生效，
//! 调用方据此判断是否在竞争中失败，而不是先读后写。
//!
//! 实现需要满足 `Send + Sync`，目前有 SQLite 与内存两种实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::HelpdeskResult;
use crate::models::{
    Agent, CandidatePool, Category, Feedback, Notification, ReassignmentLog, RotationPointer,
    SlaBreachMarker, SlaRule, Ticket, TicketFilter, TicketMessage, TicketPriority, TicketStatus,
};

/// 工单仓储接口
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// 创建工单，返回带有生成ID的工单
    async fn create(&self, ticket: &Ticket) -> HelpdeskResult<Ticket>;

    /// 根据ID获取工单（包含消息）
    async fn get_by_id(&self, id: i64) -> HelpdeskResult<Option<Ticket>>;

    /// 根据过滤条件查询工单，按创建时间升序
    async fn list(&self, filter: &TicketFilter) -> HelpdeskResult<Vec<Ticket>>;

    /// 状态为 open/assigned 且已有负责人的工单，供改派扫描使用
    async fn list_pending_assigned(&self) -> HelpdeskResult<Vec<Ticket>>;

    /// SLA检查范围：未关闭的工单，以及 `closed_since` 之后关闭的工单
    async fn list_for_sla(&self, closed_since: DateTime<Utc>) -> HelpdeskResult<Vec<Ticket>>;

    /// 状态为 open/assigned 且坐席最后回复早于 `cutoff` 的工单
    async fn list_idle_pending(&self, cutoff: DateTime<Utc>) -> HelpdeskResult<Vec<Ticket>>;

    /// 条件分配：仅当工单仍未分配且状态为 open 时写入
    ///
    /// 同时设置 agent_id、priority、status=assigned 与 sla_due。
    /// 返回 `false` 表示工单已被其他请求分配或状态已变化。
    async fn assign_if_unassigned(
        &self,
        id: i64,
        agent_id: &str,
        priority: TicketPriority,
        sla_due: DateTime<Utc>,
    ) -> HelpdeskResult<bool>;

    /// 条件改派：仅当负责人仍为 `expected_agent` 且状态为 open/assigned 时写入，
    /// 改派记录与工单更新在同一事务内提交
    async fn reassign_with_log(
        &self,
        id: i64,
        expected_agent: Option<&str>,
        log: &ReassignmentLog,
    ) -> HelpdeskResult<bool>;

    /// 条件状态变更，目标为 closed 时同时写入 closed_at
    async fn update_status(
        &self,
        id: i64,
        expected: TicketStatus,
        next: TicketStatus,
        at: DateTime<Utc>,
    ) -> HelpdeskResult<bool>;

    /// 条件自动关闭：仍为 open/assigned 且仍处于闲置状态时关闭并标记 auto_closed
    async fn close_if_idle(
        &self,
        id: i64,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<bool>;

    /// 追加消息并更新对应一方的最后回复时间
    async fn append_message(
        &self,
        id: i64,
        message: &TicketMessage,
        from_agent: bool,
    ) -> HelpdeskResult<()>;
}

/// 坐席仓储接口
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// 新增坐席；已存在时只更新资料字段，租户、忙碌标记和最后通话/分配时间保持不变
    async fn upsert(&self, agent: &Agent) -> HelpdeskResult<()>;

    async fn get_by_id(&self, id: &str) -> HelpdeskResult<Option<Agent>>;

    /// 租户内的全部坐席，按ID排序
    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<Agent>>;

    /// 记录最近一次被分配工单的时间
    async fn touch_last_assigned(&self, id: &str, at: DateTime<Utc>) -> HelpdeskResult<()>;

    /// 条件占用：仅当坐席在线、空闲且服务该分类时置为忙碌并写入 last_call_at
    async fn try_mark_busy(
        &self,
        id: &str,
        category: &str,
        at: DateTime<Utc>,
    ) -> HelpdeskResult<bool>;

    /// 通话结束，释放忙碌标记
    async fn release(&self, id: &str) -> HelpdeskResult<bool>;
}

/// 轮询指针仓储接口
#[async_trait]
pub trait RotationRepository: Send + Sync {
    async fn get(&self, subject_key: &str) -> HelpdeskResult<Option<RotationPointer>>;

    /// 版本号CAS写入
    ///
    /// `expected_version` 为 0 表示指针尚不存在，此时执行插入。
    /// 成功后版本号加一。
    async fn compare_and_set(
        &self,
        subject_key: &str,
        expected_version: i64,
        last_index: i64,
    ) -> HelpdeskResult<bool>;
}

/// 客户专属坐席池
#[async_trait]
pub trait CandidatePoolRepository: Send + Sync {
    async fn get(&self, tenant_id: &str, customer_id: &str)
        -> HelpdeskResult<Option<CandidatePool>>;

    async fn upsert(&self, pool: &CandidatePool) -> HelpdeskResult<()>;
}

/// 改派记录查询，写入由 [`TicketRepository::reassign_with_log`] 完成
#[async_trait]
pub trait ReassignmentLogRepository: Send + Sync {
    async fn list_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Vec<ReassignmentLog>>;

    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<ReassignmentLog>>;
}

/// 站内通知
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> HelpdeskResult<()>;

    async fn list_by_recipient(
        &self,
        tenant_id: &str,
        recipient_id: &str,
    ) -> HelpdeskResult<Vec<Notification>>;

    async fn mark_read(&self, id: &str) -> HelpdeskResult<bool>;
}

/// SLA规则
#[async_trait]
pub trait SlaRuleRepository: Send + Sync {
    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<SlaRule>>;

    async fn create(&self, rule: &SlaRule) -> HelpdeskResult<SlaRule>;
}

/// SLA违约通知去重标记
#[async_trait]
pub trait BreachMarkerRepository: Send + Sync {
    /// 不存在时插入，返回是否为新插入
    async fn try_mark(&self, marker: &SlaBreachMarker) -> HelpdeskResult<bool>;

    /// 撤销标记，通知未能入队时调用，下一轮检查会重新通知
    async fn unmark(&self, marker: &SlaBreachMarker) -> HelpdeskResult<()>;

    async fn list_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Vec<SlaBreachMarker>>;
}

/// 工单分类
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<Category>>;

    async fn get_by_name(&self, tenant_id: &str, name: &str) -> HelpdeskResult<Option<Category>>;

    /// 同租户下重名返回 Conflict
    async fn create(&self, category: &Category) -> HelpdeskResult<Category>;

    /// 删除分类并把该分类下的工单迁移到 `fallback`，返回迁移的工单数
    async fn delete_with_fallback(
        &self,
        tenant_id: &str,
        name: &str,
        fallback: &str,
    ) -> HelpdeskResult<u64>;
}

/// 满意度反馈
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// 每个工单只允许一条反馈，重复提交返回 Conflict
    async fn create(&self, feedback: &Feedback) -> HelpdeskResult<Feedback>;

    async fn get_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Option<Feedback>>;
}
