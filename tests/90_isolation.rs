mod common;

use axum::http::StatusCode;
use common::{body_json, TestRequest};
use serde_json::json;
use uuid::Uuid;

// The core guarantee: two tenants on the same database and the same app
// instance can never see or reference each other's rows.

#[tokio::test]
#[ignore = "requires a PostgreSQL database via DATABASE_URL"]
async fn tenants_cannot_see_or_reference_each_others_rows() {
    let app = common::live_app().await;
    let suffix = Uuid::new_v4().simple().to_string();
    let (alpha_id, alpha_token) =
        common::register_tenant(app.clone(), &format!("Alpha {suffix}")).await;
    let (beta_id, beta_token) =
        common::register_tenant(app.clone(), &format!("Beta {suffix}")).await;
    let alpha = alpha_id.to_string();
    let beta = beta_id.to_string();

    // Alpha creates a project.
    let response = TestRequest::post("/api/v1/projects")
        .host("localhost")
        .tenant_header(&alpha)
        .bearer(&alpha_token)
        .json(json!({ "name": "Alpha Only", "starting_budget": 100.0 }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let project = body_json(response).await;
    let project_id = project["data"]["id"].as_str().expect("project id").to_string();

    // Beta's listing is empty; Alpha's row simply does not exist for Beta.
    let response = TestRequest::get("/api/v1/projects")
        .host("localhost")
        .tenant_header(&beta)
        .bearer(&beta_token)
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["data"].as_array().map(Vec::len), Some(0));

    // Fetching by id from the wrong tenant is indistinguishable from a
    // missing row.
    let response = TestRequest::get(&format!("/api/v1/projects/{project_id}"))
        .host("localhost")
        .tenant_header(&beta)
        .bearer(&beta_token)
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Writing a foreign key that points across the fence is rejected
    // before the row is touched.
    let response = TestRequest::post("/api/v1/expenses")
        .host("localhost")
        .tenant_header(&beta)
        .bearer(&beta_token)
        .json(json!({
            "project_id": project_id,
            "title": "Smuggled",
            "amount": 10.0,
            "expense_date": "2026-04-01"
        }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "CROSS_TENANT_REFERENCE");

    // Updating and deleting across the fence fail the same way as reads.
    let response = TestRequest::patch(&format!("/api/v1/projects/{project_id}"))
        .host("localhost")
        .tenant_header(&beta)
        .bearer(&beta_token)
        .json(json!({ "name": "Hijacked" }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = TestRequest::delete(&format!("/api/v1/projects/{project_id}"))
        .host("localhost")
        .tenant_header(&beta)
        .bearer(&beta_token)
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Alpha still sees its project untouched.
    let response = TestRequest::get(&format!("/api/v1/projects/{project_id}"))
        .host("localhost")
        .tenant_header(&alpha)
        .bearer(&alpha_token)
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "Alpha Only");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database via DATABASE_URL"]
async fn same_email_can_exist_under_two_tenants() {
    let app = common::live_app().await;
    let suffix = Uuid::new_v4().simple().to_string();
    let (alpha_id, alpha_token) =
        common::register_tenant(app.clone(), &format!("Mail A {suffix}")).await;
    let (beta_id, beta_token) =
        common::register_tenant(app.clone(), &format!("Mail B {suffix}")).await;

    let shared = format!("shared-{suffix}@example.test");
    for (tenant, token) in [(alpha_id, &alpha_token), (beta_id, &beta_token)] {
        let response = TestRequest::post("/api/v1/users")
            .host("localhost")
            .tenant_header(&tenant.to_string())
            .bearer(token)
            .json(json!({
                "email": shared,
                "password": "s3cret-enough",
                "first_name": "Shared",
                "last_name": "Address"
            }))
            .send(app.clone())
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Logging in under each tenant finds that tenant's user, never the
    // other's.
    for tenant in [alpha_id, beta_id] {
        let response = TestRequest::post("/api/v1/auth/login")
            .host("localhost")
            .tenant_header(&tenant.to_string())
            .json(json!({ "email": shared, "password": "s3cret-enough" }))
            .send(app.clone())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["user"]["tenant_id"], tenant.to_string());
    }
}
