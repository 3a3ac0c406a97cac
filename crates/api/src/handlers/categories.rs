use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::CurrentUser,
    error::ApiResult,
    response::{created, success},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCategoryParams {
    /// 工单迁移目标，缺省为默认分类
    pub fallback: Option<String>,
}

pub async fn list_categories(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let categories = state.engine.categories.list(&principal).await?;
    Ok(success(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let category = state
        .engine
        .categories
        .create(&principal, &request.name)
        .await?;
    Ok(created(category))
}

/// 删除分类，返回迁移到目标分类的工单数
pub async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(name): Path<String>,
    params: Result<Query<DeleteCategoryParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params?;
    let moved = state
        .engine
        .categories
        .delete(&principal, &name, params.fallback.as_deref())
        .await?;
    Ok(success(json!({ "deleted": name, "moved_tickets": moved })))
}
