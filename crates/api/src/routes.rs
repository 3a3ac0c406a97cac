use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use helpdesk_dispatcher::HelpdeskEngine;

use crate::auth::JwtService;
use crate::handlers::{
    calls::{release_agent, route_call},
    categories::{create_category, delete_category, list_categories},
    directory::{
        create_sla_rule, list_agents, list_notifications, list_sla_rules, mark_notification_read,
        set_candidate_pool, upsert_agent,
    },
    health::health_check,
    jobs::run_job,
    tickets::{
        append_message, assign_ticket, change_status, create_ticket, get_ticket, list_tickets,
        reassign_ticket, reassignment_history, submit_feedback, suggest_reply, summarize_ticket,
    },
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HelpdeskEngine>,
    pub jwt: Arc<JwtService>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 工单
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/{id}", get(get_ticket))
        .route("/api/tickets/{id}/assign", post(assign_ticket))
        .route("/api/tickets/{id}/status", post(change_status))
        .route("/api/tickets/{id}/reassign", post(reassign_ticket))
        .route("/api/tickets/{id}/reassignments", get(reassignment_history))
        .route("/api/tickets/{id}/messages", post(append_message))
        .route("/api/tickets/{id}/feedback", post(submit_feedback))
        .route("/api/tickets/{id}/summary", get(summarize_ticket))
        .route("/api/tickets/{id}/suggested-reply", get(suggest_reply))
        // 来电
        .route("/api/calls", post(route_call))
        .route("/api/calls/agents/{agent_id}/release", post(release_agent))
        // 分类
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/categories/{name}", delete(delete_category))
        // 坐席目录与配置
        .route("/api/agents", get(list_agents).put(upsert_agent))
        .route("/api/customers/{customer_id}/pool", put(set_candidate_pool))
        .route("/api/sla-rules", get(list_sla_rules).post(create_sla_rule))
        // 站内通知
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", post(mark_notification_read))
        // 定时任务手动触发
        .route("/api/jobs/{name}/run", post(run_job))
        .with_state(state)
}
