use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

use helpdesk_core::{models::Role, HelpdeskError};
use helpdesk_dispatcher::JobRunner;

use crate::{auth::CurrentUser, error::ApiResult, response::success, routes::AppState};

fn runner_by_name(state: &AppState, name: &str) -> Option<Arc<JobRunner>> {
    match name {
        "sla-check" => Some(state.engine.sla_job.clone()),
        "auto-close" => Some(state.engine.auto_close_job.clone()),
        "reassignment" => Some(state.engine.reassignment_job.clone()),
        _ => None,
    }
}

/// 管理员手动触发一次定时任务，上一次执行未结束时返回 skipped
pub async fn run_job(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    principal.require_role(&[Role::Admin])?;

    let runner = runner_by_name(&state, &name).ok_or_else(|| HelpdeskError::NotFound {
        entity: "定时任务",
        id: name.clone(),
    })?;

    let status = runner.trigger().await?;
    Ok(success(status))
}
