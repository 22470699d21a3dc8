#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tally_api::auth::{generate_jwt, Claims};
use tally_api::database::models::{PlanTier, Role, Tenant};
use tally_api::database::pool;
use tally_api::state::AppState;
use tally_api::tenancy::StaticDirectory;

pub const ACME_ID: Uuid = Uuid::from_u128(0xa17e_0001);
pub const GLOBEX_ID: Uuid = Uuid::from_u128(0xa17e_0002);
pub const DORMANT_ID: Uuid = Uuid::from_u128(0xa17e_0003);

/// Build the real router over a static tenant directory and a lazily
/// connected pool. Resolution and admission never touch the database, so
/// every middleware rejection path runs without one; only handlers that
/// issue queries need a live `DATABASE_URL`.
pub fn app() -> Router {
    let directory = StaticDirectory::new()
        .with_tenant(tenant(ACME_ID, "acme", true))
        .with_tenant(tenant(GLOBEX_ID, "globex", true))
        .with_tenant(tenant(DORMANT_ID, "dormant", false))
        .with_domain("expenses.acme.com", ACME_ID);

    let pool = pool::connect_lazy().expect("lazy pool");
    tally_api::app(AppState::new(pool, Arc::new(directory)))
}

pub fn tenant(id: Uuid, subdomain: &str, active: bool) -> Tenant {
    let limits = PlanTier::Basic.default_limits();
    let now = Utc::now();
    Tenant {
        id,
        name: subdomain.to_string(),
        subdomain: subdomain.to_string(),
        plan: PlanTier::Basic,
        max_users: limits.max_users as i32,
        max_projects: limits.max_projects as i32,
        max_accounts: limits.max_accounts as i32,
        max_expenses: limits.max_expenses as i32,
        is_active: active,
        suspended_at: if active { None } else { Some(now) },
        suspension_reason: if active { None } else { Some("billing".to_string()) },
        settings: serde_json::json!({}),
        created_at: now,
        updated_at: now,
        is_deleted: false,
        deleted_at: None,
    }
}

/// Mint a token the way the login handler does, for a user of `tenant_id`.
pub fn token_for(tenant_id: Uuid, role: Role) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4(),
        email: "tester@example.test".to_string(),
        tenant_id,
        role,
        iat: now,
        exp: now + 3600,
    };
    generate_jwt(&claims).expect("sign token")
}

pub struct TestRequest {
    method: Method,
    uri: String,
    host: Option<String>,
    tenant_header: Option<String>,
    bearer: Option<String>,
    body: Option<Value>,
}

impl TestRequest {
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn patch(uri: &str) -> Self {
        Self::new(Method::PATCH, uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            host: None,
            tenant_header: None,
            bearer: None,
            body: None,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn tenant_header(mut self, value: &str) -> Self {
        self.tenant_header = Some(value.to_string());
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub async fn send(self, app: Router) -> Response {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(host) = &self.host {
            builder = builder.header(header::HOST, host);
        }
        if let Some(value) = &self.tenant_header {
            builder = builder.header("X-Tenant-Id", value);
        }
        if let Some(token) = &self.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match self.body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        app.oneshot(request).await.expect("infallible service")
    }
}

/// Production wiring against a real database, for the ignored end-to-end
/// tests. Tenants registered during the test resolve through the live
/// directory, so requests address them via the tenant header.
pub async fn live_app() -> Router {
    let pool = pool::connect().await.expect("DATABASE_URL must point at a running PostgreSQL");
    tally_api::app(AppState::for_pool(pool))
}

/// Register a fresh tenant and return its id and the owner's token.
pub async fn register_tenant(app: Router, company: &str) -> (Uuid, String) {
    let response = TestRequest::post("/api/v1/auth/register")
        .host("localhost")
        .json(serde_json::json!({
            "company_name": company,
            "email": format!("owner@{}.test", Uuid::new_v4().simple()),
            "password": "s3cret-enough",
            "first_name": "Test",
            "last_name": "Owner"
        }))
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED, "registration failed");

    let body = body_json(response).await;
    let tenant_id = body["data"]["tenant"]["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("tenant id in response");
    let token = body["data"]["token"].as_str().expect("token in response").to_string();
    (tenant_id, token)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.expect("read body").to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Assert the error envelope: `{"error": true, "message": ..., "code": ...}`.
pub async fn assert_error(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(body["error"], true, "not an error envelope: {body}");
    assert_eq!(body["code"], code, "unexpected code: {body}");
}
