use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use helpdesk_core::models::{SlaRule, TicketPriority};
use helpdesk_dispatcher::AgentProfile;

use crate::{
    auth::CurrentUser,
    error::ApiResult,
    response::{created, success},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PoolRequest {
    pub agent_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlaRuleRequest {
    /// 为空表示租户默认规则
    pub priority: Option<TicketPriority>,
    pub response_hours: f64,
    pub resolution_hours: f64,
}

pub async fn list_agents(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let agents = state.engine.directory.list_agents(&principal).await?;
    Ok(success(agents))
}

pub async fn upsert_agent(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    payload: Result<Json<AgentProfile>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(profile) = payload?;
    let saved = state.engine.directory.upsert_agent(&principal, profile).await?;
    Ok(success(saved))
}

pub async fn set_candidate_pool(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(customer_id): Path<String>,
    payload: Result<Json<PoolRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let pool = state
        .engine
        .directory
        .set_candidate_pool(&principal, &customer_id, request.agent_ids)
        .await?;
    Ok(success(pool))
}

pub async fn list_sla_rules(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let rules = state.engine.directory.list_sla_rules(&principal).await?;
    Ok(success(rules))
}

pub async fn create_sla_rule(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    payload: Result<Json<SlaRuleRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let rule = SlaRule {
        id: 0,
        tenant_id: principal.tenant_id.clone(),
        priority: request.priority,
        response_hours: request.response_hours,
        resolution_hours: request.resolution_hours,
    };

    let created_rule = state.engine.directory.create_sla_rule(&principal, rule).await?;
    Ok(created(created_rule))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let notifications = state.engine.directory.inbox(&principal).await?;
    Ok(success(notifications))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.engine.directory.mark_read(&principal, &id).await?;
    Ok(success(json!({ "id": id, "read": true })))
}
