//! API Integration Tests
//!
//! Account activation, event publication and the route guard, end to end.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

mod common;

use common::{create_event, event_payload, TestServer, PASSWORD};

#[tokio::test]
async fn test_health() {
    use tower::util::ServiceExt;

    let server = TestServer::new();
    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_first_account_is_admin_and_others_wait_for_activation() {
    let server = TestServer::new();

    // 1. First ever account
    let mut anonymous = server.client();
    let (status, body) = anonymous
        .post(
            "/auth/register",
            json!({ "name": "Alice", "email": "alice@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "ADMIN");
    assert_eq!(body["isActive"], true);

    let mut alice = server.login("alice@example.com").await;
    let (_, me) = alice.get("/auth/me").await;
    assert_eq!(me["role"], "ADMIN");

    // 2. Second account waits
    let bob_id = server.register("Bob", "bob@example.com", "USER").await;
    let mut bob = server.client();
    let (status, body) = bob
        .post(
            "/auth/login",
            json!({ "email": "bob@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "account_pending_activation");
    assert!(bob.cookies.is_empty());

    // 3. Admin activates, login now returns the full account
    let (status, body) = alice
        .post(&format!("/admin/users/{bob_id}/activate"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], true);

    let (status, body) = bob
        .post(
            "/auth/login",
            json!({ "email": "bob@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["$id"], bob_id.as_str());
    assert_eq!(body["role"], "USER");
    assert_eq!(body["email"], "bob@example.com");
    assert!(bob.cookies.contains_key("auth-storage"));
    assert!(bob.cookies.contains_key("eventcity-session"));
}

#[tokio::test]
async fn test_admin_role_cannot_be_self_assigned() {
    let server = TestServer::new();
    server.admin().await;

    let (status, body) = server
        .client()
        .post(
            "/auth/register",
            json!({ "name": "Mallory", "email": "mallory@example.com", "password": PASSWORD, "role": "ADMIN" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "admin_role_reserved");
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let server = TestServer::new();
    server.register("Alice", "alice@example.com", "USER").await;

    let (status, body) = server
        .client()
        .post(
            "/auth/register",
            json!({ "name": "Alice Again", "email": "Alice@Example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "email_taken");
}

#[tokio::test]
async fn test_new_event_is_draft_until_published() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    let mut organizer = server
        .activated(&mut admin, "Olga", "olga@example.com", "ORGANIZER")
        .await;

    // Lifecycle fields in the payload are ignored
    let mut payload = event_payload("River Jazz");
    payload["status"] = json!("PUBLISHED");
    payload["featured"] = json!(true);
    payload["viewCount"] = json!(500);
    let (status, event) = organizer.post("/organizer/events", payload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["status"], "DRAFT");
    assert_eq!(event["featured"], false);
    assert_eq!(event["viewCount"], 0);
    let id = event["$id"].as_str().unwrap().to_string();

    let mut visitor = server.client();
    let (_, listing) = visitor.get("/events").await;
    assert_eq!(listing["total"], 0);
    let (status, _) = visitor.get(&format!("/events/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = admin
        .post(&format!("/admin/events/{id}/status"), json!({ "action": "publish" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["status"], "PUBLISHED");
    assert!(body["availableActions"]
        .as_array()
        .unwrap()
        .contains(&json!({ "action": "complete" })));

    let (_, listing) = visitor.get("/events").await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["$id"], id.as_str());

    let (status, detail) = visitor.get(&format!("/events/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["organizer"]["name"], "Olga");
}

#[tokio::test]
async fn test_invalid_transition_is_conflict() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    let id = create_event(&mut admin, "Draft Only").await;

    let (status, body) = admin
        .post(&format!("/admin/events/{id}/status"), json!({ "action": "complete" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "invalid_transition");
}

#[tokio::test]
async fn test_route_guard() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    let mut user = server
        .activated(&mut admin, "Uma", "uma@example.com", "USER")
        .await;

    let (status, _) = server.client().get("/admin/users").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server.client().get("/me/favorites").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = user.get("/admin/users").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "forbidden");

    let (status, _) = user.get("/organizer/events").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = admin.get("/admin/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let server = TestServer::new();
    let (_, headers, _) = server
        .client()
        .send(Method::GET, "/events", Value::Null)
        .await;

    let id = headers.get("x-correlation-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_admin_cannot_be_deactivated() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    let (_, me) = admin.get("/auth/me").await;
    let id = me["$id"].as_str().unwrap().to_string();

    let (status, body) = admin
        .post(&format!("/admin/users/{id}/deactivate"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "admin_always_active");
}

/// Create and publish an event with the given listing attributes
async fn listed(
    admin: &mut common::Client,
    title: &str,
    category: &str,
    price: Option<i64>,
    start: &str,
    location: &str,
) {
    let start: chrono::DateTime<chrono::Utc> = start.parse().unwrap();
    let mut payload = event_payload(title);
    payload["category"] = json!(category);
    payload["startDate"] = json!(start);
    payload["endDate"] = json!(start + chrono::Duration::hours(2));
    payload["location"] = json!(location);
    payload["isFree"] = json!(price.is_none());
    payload["price"] = json!(price);

    let (status, event) = admin.post("/organizer/events", payload).await;
    assert_eq!(status, StatusCode::CREATED, "create {title}: {event}");
    let id = event["$id"].as_str().unwrap();
    let (status, _) = admin
        .post(&format!("/admin/events/{id}/status"), json!({ "action": "publish" }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

fn titles(listing: &Value) -> Vec<String> {
    let mut titles: Vec<String> = listing["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    titles
}

#[tokio::test]
async fn test_listing_filters_narrow_results() {
    let server = TestServer::new();
    let mut admin = server.admin().await;
    listed(&mut admin, "Jazz by the River", "MUSIC", None, "2030-06-01T18:00:00Z", "Riverside Park").await;
    listed(&mut admin, "Rust Meetup", "TECHNOLOGY", Some(1500), "2030-06-10T18:00:00Z", "Old Town Library").await;
    listed(&mut admin, "Jazz Brunch", "FOOD", Some(2500), "2030-06-20T11:00:00Z", "Harbor Hall").await;
    create_event(&mut admin, "Jazz Rehearsal").await;

    let mut visitor = server.client();

    let (_, all) = visitor.get("/events").await;
    assert_eq!(all["total"], 3);

    // Title search, drafts excluded
    let (_, found) = visitor.get("/events?search=jazz").await;
    assert_eq!(titles(&found), ["Jazz Brunch", "Jazz by the River"]);

    let (_, found) = visitor.get("/events?category=TECHNOLOGY").await;
    assert_eq!(titles(&found), ["Rust Meetup"]);

    let (_, found) = visitor.get("/events?isFree=false").await;
    assert_eq!(titles(&found), ["Jazz Brunch", "Rust Meetup"]);
    let (_, found) = visitor.get("/events?isFree=true").await;
    assert_eq!(titles(&found), ["Jazz by the River"]);

    // Both date bounds are inclusive
    let (_, found) = visitor
        .get("/events?startFrom=2030-06-01T18:00:00Z&startTo=2030-06-10T18:00:00Z")
        .await;
    assert_eq!(titles(&found), ["Jazz by the River", "Rust Meetup"]);
    let (_, found) = visitor.get("/events?startFrom=2030-06-10T18:00:01Z").await;
    assert_eq!(titles(&found), ["Jazz Brunch"]);

    let (_, found) = visitor.get("/events?location=town").await;
    assert_eq!(titles(&found), ["Rust Meetup"]);

    let (_, found) = visitor.get("/events?search=jazz&isFree=false").await;
    assert_eq!(titles(&found), ["Jazz Brunch"]);
    assert_eq!(found["total"], 1);
}
