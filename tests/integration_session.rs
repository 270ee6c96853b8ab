//! Session consistency over HTTP
//!
//! Cookies follow the provider: sign-out, deactivation and forged mirrors.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, Method, StatusCode};
use serde_json::{json, Value};

use eventcity::domain::Account;
use eventcity::identity::{Identity, IdentityError, IdentityProvider, MemoryIdentityProvider, Session};
use eventcity::session::MirrorEnvelope;

mod common;

use common::TestServer;

#[tokio::test]
async fn test_logout_redirects_and_clears_cookies() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    assert_eq!(admin.cookies.len(), 2);

    let (status, headers, _) = admin.send(Method::POST, "/auth/logout", Value::Null).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/");
    assert!(admin.cookies.is_empty());

    let (status, me) = admin.get("/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me, Value::Null);
}

#[tokio::test]
async fn test_logout_without_session_still_redirects() {
    let server = TestServer::new();
    let (status, headers, _) = server
        .client()
        .send(Method::POST, "/auth/logout", Value::Null)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_deactivation_reaches_open_sessions() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    let mut user = server
        .activated(&mut admin, "Uma", "uma@example.com", "USER")
        .await;
    let (_, me) = user.get("/auth/me").await;
    let id = me["$id"].as_str().unwrap().to_string();

    let (status, _) = user.get("/me/favorites").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = admin
        .post(&format!("/admin/users/{id}/deactivate"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], false);

    let (status, me) = user.post("/auth/refresh", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me, json!({ "notActivated": true }));
    assert!(!user.cookies.contains_key("auth-storage"));

    let (status, _) = user.get("/me/favorites").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Provider that is down for session reads
struct ProviderDown(MemoryIdentityProvider);

#[async_trait]
impl IdentityProvider for ProviderDown {
    async fn create_identity(&self, email: &str, password: &str, name: &str) -> Result<Identity, IdentityError> {
        self.0.create_identity(email, password, name).await
    }

    async fn delete_identity(&self, id: &str) -> Result<(), IdentityError> {
        self.0.delete_identity(id).await
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.0.create_session(email, password).await
    }

    async fn get_session(&self, _session_id: &str) -> Result<Option<Session>, IdentityError> {
        Err(IdentityError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), IdentityError> {
        self.0.delete_session(session_id).await
    }

    async fn purge_expired_sessions(&self) -> Result<u64, IdentityError> {
        self.0.purge_expired_sessions().await
    }
}

fn forged_admin_cookie() -> String {
    let now = chrono::Utc::now();
    let forged: Account = serde_json::from_value(json!({
        "$id": "mallory",
        "name": "Mallory",
        "email": "mallory@example.com",
        "role": "ADMIN",
        "isActive": true,
        "$createdAt": now,
        "$updatedAt": now,
    }))
    .unwrap();
    MirrorEnvelope::new(Some(forged)).encode().unwrap()
}

#[tokio::test]
async fn test_forged_mirror_is_not_trusted() {
    let server = TestServer::new();
    server.admin().await;

    let mut mallory = server.client();
    mallory
        .cookies
        .insert("auth-storage".to_string(), forged_admin_cookie());

    // The guard lets the request through, the handler does not
    let (status, body) = mallory.get("/admin/users").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "not_authenticated");
    assert!(!mallory.cookies.contains_key("auth-storage"));
}

#[tokio::test]
async fn test_failed_login_signs_out_current_user() {
    let server = TestServer::new();
    let mut admin = server.admin().await;

    let (status, body) = admin
        .post(
            "/auth/login",
            json!({ "email": "admin@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "invalid_credentials");
    assert!(admin.cookies.is_empty());

    let (_, me) = admin.get("/auth/me").await;
    assert_eq!(me, Value::Null);
}

#[tokio::test]
async fn test_profile_update_refreshes_mirror() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    let mut user = server
        .activated(&mut admin, "Uma", "uma@example.com", "USER")
        .await;
    let before = user.cookies.get("auth-storage").cloned();

    let (status, headers, body) = user
        .send(
            Method::PATCH,
            "/me/profile",
            json!({ "name": "Uma Bright", "bio": "Likes jazz" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Uma Bright");
    assert!(headers
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("auth-storage=")));
    assert_ne!(user.cookies.get("auth-storage").cloned(), before);

    let (_, me) = user.get("/auth/me").await;
    assert_eq!(me["name"], "Uma Bright");
    assert_eq!(me["bio"], "Likes jazz");
    // Email is owned by the identity provider
    assert_eq!(me["email"], "uma@example.com");
}

#[tokio::test]
async fn test_forged_mirror_is_not_trusted_while_provider_is_down() {
    let server = TestServer::with_identity(Arc::new(ProviderDown(MemoryIdentityProvider::default())));

    let mut mallory = server.client();
    mallory
        .cookies
        .insert("auth-storage".to_string(), forged_admin_cookie());
    mallory
        .cookies
        .insert("eventcity-session".to_string(), "garbage".to_string());

    let (status, body) = mallory.get("/admin/users").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "not_authenticated");

    let (status, _) = mallory.get("/admin/stats").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
