use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use helpdesk_dispatcher::CallRouteOutcome;

use crate::{
    auth::CurrentUser,
    error::ApiResult,
    response::{accepted, success},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub category: String,
}

/// 来电路由，选中的坐席同时被标记为忙碌
pub async fn route_call(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    payload: Result<Json<CallRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let outcome = state
        .engine
        .calls
        .route_call(&principal, &request.category)
        .await?;

    Ok(match outcome {
        CallRouteOutcome::Routed(agent) => success(agent).into_response(),
        CallRouteOutcome::NoAgentAvailable => {
            accepted(serde_json::Value::Null, "当前没有空闲坐席").into_response()
        }
    })
}

pub async fn release_agent(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(agent_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let released = state.engine.calls.release(&principal, &agent_id).await?;
    Ok(success(json!({ "agent_id": agent_id, "released": released })))
}
