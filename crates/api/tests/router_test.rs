//! Router tests that stop before the database: authentication, role checks
//! and the health endpoint of a server whose database is down.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::AUTHORIZATION},
};
use http_body_util::BodyExt;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use referra_api::{AppState, create_router};
use referra_core::CommissionPolicy;
use referra_shared::{ADMIN_ROLE, JwtConfig, JwtService, PARTNER_ROLE};

const SECRET: &str = "router-test-secret";

fn jwt() -> JwtService {
    JwtService::new(JwtConfig {
        secret: SECRET.to_string(),
        access_token_expires_minutes: 15,
    })
}

fn app() -> Router {
    let state = AppState::new(
        DatabaseConnection::Disconnected,
        jwt(),
        CommissionPolicy::default(),
    );
    create_router(state)
}

fn token(user_id: Uuid, role: &str) -> String {
    jwt().generate_access_token(user_id, role).unwrap()
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let request = Request::get(format!("/api/v1/partners/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_token_from_other_issuer_is_unauthorized() {
    let forged = JwtService::new(JwtConfig {
        secret: "someone-else".to_string(),
        access_token_expires_minutes: 15,
    })
    .generate_access_token(Uuid::new_v4(), ADMIN_ROLE)
    .unwrap();
    let request = Request::post("/api/v1/commissions/sweep")
        .header(AUTHORIZATION, format!("Bearer {forged}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_partner_cannot_create_partners() {
    let request = Request::post("/api/v1/partners")
        .header(AUTHORIZATION, format!("Bearer {}", token(Uuid::new_v4(), PARTNER_ROLE)))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"Acme","email":"acme@example.com"}"#))
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
}

#[tokio::test]
async fn test_partner_cannot_read_other_partner() {
    let request = Request::get(format!("/api/v1/partners/{}", Uuid::new_v4()))
        .header(AUTHORIZATION, format!("Bearer {}", token(Uuid::new_v4(), PARTNER_ROLE)))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_partner_cannot_run_sweep() {
    let request = Request::post("/api/v1/commissions/sweep")
        .header(AUTHORIZATION, format!("Bearer {}", token(Uuid::new_v4(), PARTNER_ROLE)))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let request = Request::get("/api/v1/health").body(Body::empty()).unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
}
