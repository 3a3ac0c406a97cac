use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use helpdesk_api::{auth::JwtService, create_app};
use helpdesk_core::{
    config::AppConfig,
    models::{Principal, Role},
};
use helpdesk_dispatcher::HelpdeskEngine;
use helpdesk_infrastructure::{
    DisabledAiTextService, InMemoryStore, LogNotifier, MetricsCollector, Repositories,
};

struct TestApp {
    router: Router,
    jwt: JwtService,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let repos = Repositories::in_memory(InMemoryStore::new());
        let (engine, _worker) = HelpdeskEngine::build(
            &config,
            &repos,
            Arc::new(LogNotifier),
            Arc::new(DisabledAiTextService),
            Arc::new(MetricsCollector::new()),
        );

        Self {
            router: create_app(Arc::new(engine), &config.api),
            jwt: JwtService::new(
                &config.api.auth.jwt_secret,
                config.api.auth.jwt_expiration_hours,
            ),
        }
    }

    fn token(&self, user: &str, tenant: &str, role: Role) -> String {
        self.jwt
            .generate_token(&Principal::new(user, tenant, role))
            .unwrap()
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

#[tokio::test]
async fn test_health_endpoint_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/tickets", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 401);

    let (status, _) = app
        .call(Method::GET, "/api/tickets", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ticket_intake_and_assignment_flow() {
    let app = TestApp::new();
    let customer = app.token("c1", "t1", Role::Customer);
    let admin = app.token("admin", "t1", Role::Admin);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&customer),
            Some(json!({ "subject": "printer broken", "message": "no power" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["category"], "general");
    assert_eq!(body["data"]["status"], "open");
    let id = body["data"]["id"].as_i64().unwrap();

    let assign_uri = format!("/api/tickets/{id}/assign");
    let (status, _) = app
        .call(Method::POST, &assign_uri, Some(&admin), Some(json!({ "priority": "high" })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = app
        .call(
            Method::PUT,
            "/api/agents",
            Some(&admin),
            Some(json!({ "id": "a1", "name": "Alice", "categories": ["general"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(Method::POST, &assign_uri, Some(&admin), Some(json!({ "priority": "high" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["agent_id"], "a1");
    assert_eq!(body["data"]["status"], "assigned");
    assert_eq!(body["data"]["priority"], "high");

    let (status, body) = app
        .call(Method::POST, &assign_uri, Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "CONFLICT");

    let agent = app.token("a1", "t1", Role::Agent);
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/tickets/{id}/status"),
            Some(&agent),
            Some(json!({ "status": "in-progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in-progress");
}

#[tokio::test]
async fn test_cross_tenant_access_is_forbidden() {
    let app = TestApp::new();
    let customer = app.token("c1", "t1", Role::Customer);
    let outsider = app.token("admin", "t2", Role::Admin);

    let (_, body) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&customer),
            Some(json!({ "subject": "login issue" })),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::GET, &format!("/api/tickets/{id}"), Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "FORBIDDEN");

    let (status, _) = app
        .call(Method::GET, "/api/tickets/999", Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_payloads_are_bad_requests() {
    let app = TestApp::new();
    let customer = app.token("c1", "t1", Role::Customer);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&customer),
            Some(json!({ "subject": "x", "category": "plumbing" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&customer),
            Some(json!({ "category": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_jobs_can_only_be_triggered_by_admins() {
    let app = TestApp::new();
    let admin = app.token("admin", "t1", Role::Admin);
    let agent = app.token("a1", "t1", Role::Agent);

    let (status, _) = app
        .call(Method::POST, "/api/jobs/sla-check/run", Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for job in ["sla-check", "auto-close", "reassignment"] {
        let (status, body) = app
            .call(Method::POST, &format!("/api/jobs/{job}/run"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK, "job {job}");
        assert_eq!(body["data"]["status"], "completed");
    }

    let (status, _) = app
        .call(Method::POST, "/api/jobs/unknown/run", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_call_routing_marks_agent_busy() {
    let app = TestApp::new();
    let admin = app.token("admin", "t1", Role::Admin);
    let caller = app.token("c1", "t1", Role::Customer);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/calls",
            Some(&caller),
            Some(json!({ "category": "sales" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    app.call(
        Method::PUT,
        "/api/agents",
        Some(&admin),
        Some(json!({ "id": "a1", "name": "Alice", "categories": ["sales"], "is_online": true })),
    )
    .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/calls",
            Some(&caller),
            Some(json!({ "category": "sales" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "a1");
    assert_eq!(body["data"]["is_busy"], true);

    let (status, body) = app
        .call(Method::POST, "/api/calls/agents/a1/release", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["released"], true);
}

#[tokio::test]
async fn test_category_delete_accepts_fallback_query() {
    let app = TestApp::new();
    let admin = app.token("admin", "t1", Role::Admin);
    let customer = app.token("c1", "t1", Role::Customer);

    for name in ["billing", "payments"] {
        let (status, _) = app
            .call(
                Method::POST,
                "/api/categories",
                Some(&admin),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&customer),
            Some(json!({ "subject": "refund", "category": "billing" })),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .call(
            Method::DELETE,
            "/api/categories/billing?fallback=plumbing",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::DELETE,
            "/api/categories/billing?fallback=payments",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["moved_tickets"], 1);

    let (_, body) = app
        .call(Method::GET, &format!("/api/tickets/{id}"), Some(&customer), None)
        .await;
    assert_eq!(body["data"]["category"], "payments");
}
