use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use helpdesk_core::models::{ReassignmentReason, TicketStatus};
use helpdesk_dispatcher::{AssignmentOutcome, NewTicket};

use crate::{
    auth::CurrentUser,
    error::ApiResult,
    response::{accepted, created, success},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct TicketQueryParams {
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignRequest {
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub agent_id: String,
    pub reason: ReassignmentReason,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

pub async fn create_ticket(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    payload: Result<Json<NewTicket>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let ticket = state.engine.tickets.create(&principal, request).await?;
    Ok(created(ticket))
}

/// 按角色返回可见的工单
pub async fn list_tickets(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    params: Result<Query<TicketQueryParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params?;
    let tickets = state.engine.tickets.list(&principal, params.status).await?;
    Ok(success(tickets))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let ticket = state.engine.tickets.get(&principal, id).await?;
    Ok(success(ticket))
}

/// 分配工单，无可用坐席时返回 202 且工单保持未分配
pub async fn assign_ticket(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    payload: Option<Json<AssignRequest>>,
) -> ApiResult<Response> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let outcome = state
        .engine
        .assignment
        .assign(&principal, id, request.priority.as_deref())
        .await?;

    Ok(match outcome {
        AssignmentOutcome::Assigned(ticket) => success(ticket).into_response(),
        AssignmentOutcome::NoAgentAvailable => {
            accepted(serde_json::Value::Null, "当前没有可用坐席").into_response()
        }
    })
}

pub async fn change_status(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let ticket = state
        .engine
        .tickets
        .change_status(&principal, id, request.status)
        .await?;
    Ok(success(ticket))
}

pub async fn reassign_ticket(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let ticket = state
        .engine
        .tickets
        .reassign(&principal, id, &request.agent_id, request.reason)
        .await?;
    Ok(success(ticket))
}

pub async fn reassignment_history(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let logs = state
        .engine
        .directory
        .reassignment_history(&principal, id)
        .await?;
    Ok(success(logs))
}

pub async fn append_message(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let ticket = state
        .engine
        .tickets
        .append_message(&principal, id, &request.text)
        .await?;
    Ok(success(ticket))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let feedback = state
        .engine
        .feedback
        .submit(&principal, id, request.rating, request.comment)
        .await?;
    Ok(created(feedback))
}

pub async fn summarize_ticket(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let summary = state.engine.tickets.summarize(&principal, id).await?;
    Ok(success(summary))
}

pub async fn suggest_reply(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let reply = state.engine.tickets.suggest_reply(&principal, id).await?;
    Ok(success(reply))
}
