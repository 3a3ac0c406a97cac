//! # Helpdesk API
//!
//! 工单分配引擎的 REST 接口，基于 Axum。
//!
//! 所有 `/api` 端点都要求 `Authorization: Bearer <jwt>`，令牌中携带用户、租户与角色；
//! 跨租户访问返回 403。
//!
//! ## API 端点
//!
//! ### 工单
//! - `GET /api/tickets` / `POST /api/tickets`
//! - `GET /api/tickets/{id}`
//! - `POST /api/tickets/{id}/assign`、`/status`、`/reassign`、`/messages`、`/feedback`
//! - `GET /api/tickets/{id}/reassignments`、`/summary`、`/suggested-reply`
//!
//! ### 来电
//! - `POST /api/calls`
//! - `POST /api/calls/agents/{agent_id}/release`
//!
//! ### 管理
//! - `GET|POST /api/categories`、`DELETE /api/categories/{name}`
//! - `GET|PUT /api/agents`、`PUT /api/customers/{customer_id}/pool`
//! - `GET|POST /api/sla-rules`
//! - `POST /api/jobs/{sla-check|auto-close|reassignment}/run`
//!
//! ### 通知
//! - `GET /api/notifications`、`POST /api/notifications/{id}/read`

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use helpdesk_core::config::ApiConfig;
use helpdesk_dispatcher::HelpdeskEngine;

use auth::JwtService;
use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(engine: Arc<HelpdeskEngine>, api_config: &ApiConfig) -> Router {
    let state = AppState {
        engine,
        jwt: Arc::new(JwtService::new(
            &api_config.auth.jwt_secret,
            api_config.auth.jwt_expiration_hours,
        )),
    };

    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(
                api_config.request_timeout_seconds,
            )))
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer(api_config))
    } else {
        router
    }
}
