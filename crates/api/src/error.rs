use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use helpdesk_core::HelpdeskError;

use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("业务错误: {0}")]
    Helpdesk(#[from] HelpdeskError),

    #[error("认证错误: {0}")]
    Authentication(#[from] AuthError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Helpdesk(err) => match err {
                HelpdeskError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                HelpdeskError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                HelpdeskError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                HelpdeskError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                HelpdeskError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                HelpdeskError::ExternalService(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR"),
                HelpdeskError::Database(_)
                | HelpdeskError::Serialization(_)
                | HelpdeskError::Configuration(_)
                | HelpdeskError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Authentication(err) => err.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            // 内部错误只返回概要，细节写日志
            ApiError::Helpdesk(
                err @ (HelpdeskError::Database(_)
                | HelpdeskError::Serialization(_)
                | HelpdeskError::Configuration(_)
                | HelpdeskError::Internal(_)),
            ) => err.user_message().to_string(),
            ApiError::Helpdesk(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "error": {
                "message": self.message(),
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: HelpdeskError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_helpdesk_errors_map_to_status_codes() {
        assert_eq!(status_of(HelpdeskError::unauthorized("x")), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(HelpdeskError::forbidden("x")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(HelpdeskError::ticket_not_found(1)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(HelpdeskError::validation_error("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(HelpdeskError::conflict("x")), StatusCode::CONFLICT);
        assert_eq!(status_of(HelpdeskError::external("x")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(HelpdeskError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(HelpdeskError::Internal("连接串 secret".into()));
        assert!(!err.message().contains("secret"));
    }

    #[test]
    fn test_authentication_error_is_unauthorized() {
        let response = ApiError::from(AuthError::MissingToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
