mod common;

use axum::http::StatusCode;
use common::{body_json, TestRequest};
use serde_json::json;
use uuid::Uuid;

// End-to-end flows against a live database. Each test provisions its own
// tenant, so runs are independent and repeatable.

#[tokio::test]
#[ignore = "requires a PostgreSQL database via DATABASE_URL"]
async fn register_then_work_inside_the_tenant() {
    let app = common::live_app().await;
    let company = format!("Workflow Co {}", Uuid::new_v4().simple());
    let (tenant_id, token) = common::register_tenant(app.clone(), &company).await;
    let tenant = tenant_id.to_string();

    // The owner's identity comes back from /auth/me.
    let response = TestRequest::get("/api/v1/auth/me")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&token)
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["role"], "owner");

    // Create a project, then an expense inside it.
    let response = TestRequest::post("/api/v1/projects")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&token)
        .json(json!({ "name": "Launch", "starting_budget": 5000.0 }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let project = body_json(response).await;
    let project_id = project["data"]["id"].as_str().expect("project id").to_string();

    let response = TestRequest::post("/api/v1/expenses")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&token)
        .json(json!({
            "project_id": project_id,
            "title": "Venue deposit",
            "amount": 450.25,
            "expense_date": "2026-03-10"
        }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let expense = body_json(response).await;
    assert_eq!(expense["data"]["tenant_id"], tenant);

    // Listing sees exactly what was created.
    let response = TestRequest::get("/api/v1/expenses")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&token)
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database via DATABASE_URL"]
async fn login_issues_a_working_token() {
    let app = common::live_app().await;
    let company = format!("Login Co {}", Uuid::new_v4().simple());

    let email = format!("owner@{}.test", Uuid::new_v4().simple());
    let response = TestRequest::post("/api/v1/auth/register")
        .host("localhost")
        .json(json!({
            "company_name": company,
            "email": email,
            "password": "s3cret-enough",
            "first_name": "Log",
            "last_name": "In"
        }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let tenant = body["data"]["tenant"]["id"].as_str().expect("tenant id").to_string();

    // Login must be tenant-addressed; the fresh token works immediately.
    let response = TestRequest::post("/api/v1/auth/login")
        .host("localhost")
        .tenant_header(&tenant)
        .json(json!({ "email": email, "password": "s3cret-enough" }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["data"]["token"].as_str().expect("token").to_string();

    let response = TestRequest::get("/api/v1/projects")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&token)
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // A wrong password stays a 401 regardless of the account existing.
    let app = common::live_app().await;
    let response = TestRequest::post("/api/v1/auth/login")
        .host("localhost")
        .tenant_header(&tenant)
        .json(json!({ "email": email, "password": "wrong-password" }))
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database via DATABASE_URL"]
async fn role_gates_hold_for_members() {
    let app = common::live_app().await;
    let company = format!("Gate Co {}", Uuid::new_v4().simple());
    let (tenant_id, owner_token) = common::register_tenant(app.clone(), &company).await;
    let tenant = tenant_id.to_string();

    // Owner invites a plain member.
    let member_email = format!("member@{}.test", Uuid::new_v4().simple());
    let response = TestRequest::post("/api/v1/users")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&owner_token)
        .json(json!({
            "email": member_email,
            "password": "s3cret-enough",
            "first_name": "Plain",
            "last_name": "Member",
            "role": "member"
        }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = TestRequest::post("/api/v1/auth/login")
        .host("localhost")
        .tenant_header(&tenant)
        .json(json!({ "email": member_email, "password": "s3cret-enough" }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let member_token = body["data"]["token"].as_str().expect("token").to_string();

    // Members cannot manage users or trigger evaluation runs.
    let response = TestRequest::get("/api/v1/users")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&member_token)
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::OK); // listing is open to members

    let response = TestRequest::post("/api/v1/users")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&member_token)
        .json(json!({
            "email": "x@y.test",
            "password": "s3cret-enough",
            "first_name": "No",
            "last_name": "Chance"
        }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = TestRequest::post("/api/v1/alerts/evaluate")
        .host("localhost")
        .tenant_header(&tenant)
        .bearer(&member_token)
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
