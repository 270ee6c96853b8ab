//! API Middleware
//!
//! Request logging, session resolution and the route guard.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Account, DomainError, OperationContext, Role};
use crate::error::AppError;
use crate::session::mirror::{read_mirror, read_session};
use crate::session::{CookieMirror, SessionContext};

use super::state::AppState;

/// Correlation header, accepted from clients and echoed back
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// The request's session, shared with handlers that sign in or out
#[derive(Clone)]
pub struct SessionHandle(pub Arc<Mutex<SessionContext>>);

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

fn correlation_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Request logging middleware.
///
/// Assigns a correlation id when the client sent none.
pub async fn logging_middleware(mut request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();

    let correlation_id = correlation_id(request.headers()).unwrap_or_else(Uuid::new_v4);
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let headers = mask_headers_for_logging(request.headers());
    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        version = ?version,
        correlation_id = %correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let mut response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        correlation_id = %correlation_id,
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

// =========================================================================
// Session Middleware
// =========================================================================

/// Set while session loads are failing
static PROVIDER_DOWN: AtomicBool = AtomicBool::new(false);

/// Record the outcome of a session load. Returns true when it flips the
/// outage state, so only the first failure and the recovery are loud.
fn provider_state_changed(down: &AtomicBool, failed: bool) -> bool {
    down.swap(failed, Ordering::Relaxed) != failed
}

/// First `X-Forwarded-For` hop, else the socket peer
fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
}

/// Resolve the session from cookies and attach an [`OperationContext`].
///
/// Cookie changes made here or by the handler are written to the response.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mirror = Arc::new(CookieMirror::new(jar.clone(), state.config.is_production()));
    let mut session = state
        .session(mirror.clone())
        .with_session_id(read_session(&jar))
        .with_local(read_mirror(&jar));

    // Only a successful provider read names the caller
    let caller = match session.load().await {
        Ok(status) => {
            if provider_state_changed(&PROVIDER_DOWN, false) {
                tracing::info!("Identity provider reachable again");
            }
            status.into_account()
        }
        Err(e) => {
            // Provider unreachable: keep the cookies, serve the request anonymously
            if provider_state_changed(&PROVIDER_DOWN, true) {
                tracing::warn!(error = %e, "Failed to load session");
            } else {
                tracing::debug!(error = %e, "Failed to load session");
            }
            None
        }
    };

    let mut context = OperationContext::new();
    if let Some(id) = correlation_id(request.headers()) {
        context = context.with_correlation_id(id);
    }
    if let Some(ip) = client_ip(&request) {
        context = context.with_client_ip(ip);
    }
    if let Some(account) = caller {
        context = context.with_caller(account);
    }

    request.extensions_mut().insert(context);
    request
        .extensions_mut()
        .insert(SessionHandle(Arc::new(Mutex::new(session))));

    let response = next.run(request).await;
    (mirror.jar(), response).into_response()
}

// =========================================================================
// Route Guard
// =========================================================================

/// Outcome of the route guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Unauthenticated,
    Forbidden,
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix || path.strip_prefix(prefix).map_or(false, |rest| rest.starts_with('/'))
}

/// Gate a path on the mirrored user alone
pub fn decide(path: &str, user: Option<&Account>) -> GuardDecision {
    let allowed: &[Role] = if under(path, "/admin") {
        &[Role::Admin]
    } else if under(path, "/organizer") {
        &[Role::Organizer, Role::Admin]
    } else if under(path, "/me") {
        &[Role::Admin, Role::Organizer, Role::User]
    } else {
        return GuardDecision::Allow;
    };

    match user {
        None => GuardDecision::Unauthenticated,
        Some(user) if user.has_role(allowed) => GuardDecision::Allow,
        Some(_) => GuardDecision::Forbidden,
    }
}

/// Reject protected paths early using the mirror cookie.
///
/// Handlers still authorize against the provider-backed context.
pub async fn route_guard(jar: CookieJar, request: Request<Body>, next: Next) -> Response {
    let user = read_mirror(&jar);
    match decide(request.uri().path(), user.as_ref()) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Unauthenticated => {
            tracing::debug!(path = %request.uri().path(), "Route guard: no identity");
            AppError::from(DomainError::NotAuthenticated).into_response()
        }
        GuardDecision::Forbidden => {
            tracing::debug!(path = %request.uri().path(), "Route guard: role mismatch");
            AppError::from(DomainError::forbidden("insufficient role for this area")).into_response()
        }
    }
}
