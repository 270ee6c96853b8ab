//! Common test utilities
//!
//! Drives the full router over the in-memory backends.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use eventcity::api::{build_app, AppState};
use eventcity::identity::{IdentityProvider, MemoryIdentityProvider};
use eventcity::store::MemoryDocumentStore;
use eventcity::Config;

pub const PASSWORD: &str = "password123";

/// Application wired to fresh in-memory backends
pub struct TestServer {
    pub app: Router,
    pub state: AppState,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_identity(Arc::new(MemoryIdentityProvider::default()))
    }

    pub fn with_identity(identity: Arc<dyn IdentityProvider>) -> Self {
        let state = AppState::new(Config::local(), Arc::new(MemoryDocumentStore::new()), identity);
        Self {
            app: build_app(state.clone()),
            state,
        }
    }

    /// A browser with its own cookie jar
    pub fn client(&self) -> Client {
        Client {
            app: self.app.clone(),
            cookies: BTreeMap::new(),
        }
    }

    /// Register an account through the API and return its id
    pub async fn register(&self, name: &str, email: &str, role: &str) -> String {
        let (status, body) = self
            .client()
            .post(
                "/auth/register",
                json!({ "name": name, "email": email, "password": PASSWORD, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {email}: {body}");
        body["$id"].as_str().unwrap().to_string()
    }

    /// Sign in as `email`
    pub async fn login(&self, email: &str) -> Client {
        let mut client = self.client();
        let (status, body) = client
            .post("/auth/login", json!({ "email": email, "password": PASSWORD }))
            .await;
        assert_eq!(status, StatusCode::OK, "login {email}: {body}");
        client
    }

    /// First account becomes the admin
    pub async fn admin(&self) -> Client {
        self.register("Admin", "admin@example.com", "USER").await;
        self.login("admin@example.com").await
    }

    /// Register an account and have `admin` activate it
    pub async fn activated(&self, admin: &mut Client, name: &str, email: &str, role: &str) -> Client {
        let id = self.register(name, email, role).await;
        let (status, body) = admin
            .post(&format!("/admin/users/{id}/activate"), Value::Null)
            .await;
        assert_eq!(status, StatusCode::OK, "activate {email}: {body}");
        self.login(email).await
    }
}

/// Sends requests and keeps the cookies the server sets
#[derive(Clone)]
pub struct Client {
    app: Router,
    pub cookies: BTreeMap<String, String>,
}

impl Client {
    pub async fn send(&mut self, method: Method, path: &str, body: Value) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("/api/v1{path}"));
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = if body.is_null() {
            builder.body(Body::empty()).unwrap()
        } else {
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        self.absorb(&headers);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, json)
    }

    fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            let raw = value.to_str().unwrap();
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() || raw.contains("Max-Age=0") {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.to_string());
            }
        }
    }

    pub async fn get(&mut self, path: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::GET, path, Value::Null).await;
        (status, body)
    }

    pub async fn post(&mut self, path: &str, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::POST, path, body).await;
        (status, body)
    }

    pub async fn put(&mut self, path: &str, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::PUT, path, body).await;
        (status, body)
    }

    pub async fn patch(&mut self, path: &str, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::PATCH, path, body).await;
        (status, body)
    }

    pub async fn delete(&mut self, path: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::DELETE, path, Value::Null).await;
        (status, body)
    }
}

/// Event creation payload starting a week from now
pub fn event_payload(title: &str) -> Value {
    let start = chrono::Utc::now() + chrono::Duration::days(7);
    let end = start + chrono::Duration::hours(3);
    json!({
        "title": title,
        "description": "An evening of live music by the river",
        "category": "MUSIC",
        "startDate": start,
        "endDate": end,
        "location": "Riverside Park",
        "isFree": true,
    })
}

/// Create an event as `organizer` and return its id
pub async fn create_event(organizer: &mut Client, title: &str) -> String {
    let (status, body) = organizer.post("/organizer/events", event_payload(title)).await;
    assert_eq!(status, StatusCode::CREATED, "create event: {body}");
    body["$id"].as_str().unwrap().to_string()
}

/// Create and publish an event
pub async fn published_event(organizer: &mut Client, admin: &mut Client, title: &str) -> String {
    let id = create_event(organizer, title).await;
    let (status, body) = admin
        .post(&format!("/admin/events/{id}/status"), json!({ "action": "publish" }))
        .await;
    assert_eq!(status, StatusCode::OK, "publish: {body}");
    id
}
