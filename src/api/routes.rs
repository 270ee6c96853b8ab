//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::keys;
use crate::domain::{
    available_actions, Account, AuthStatus, Event, EventCategory, EventDetail, EventFilters,
    EventPatch, Favorite, NewEvent, OperationContext, Page, PageInfo, ProfileChanges, Registration,
    Role, StatusAction,
};
use crate::error::AppResult;
use crate::handlers::{
    Credentials, ListAccountsQuery, ListEventsQuery, ManagedEventsQuery, RecordViewCommand,
    RegisterCommand, RegisteredEvent,
};
use crate::projection::{AdminStats, OrganizerStats};

use super::middleware::SessionHandle;
use super::state::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

/// Page of items with cursor metadata
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page_info: PageInfo,
}

impl<T> ListResponse<T> {
    fn from_page(page: Page<T>, offset: usize, limit: usize) -> Self {
        let page_info = PageInfo::new(offset, limit, page.items.len(), page.total);
        Self {
            items: page.items,
            total: page.total,
            page_info,
        }
    }
}

/// `limit`/`offset` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

/// Public listing parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<EventCategory>,
    #[serde(default)]
    pub is_free: Option<bool>,
    #[serde(default)]
    pub start_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ListEventsParams {
    fn filters(&self) -> EventFilters {
        EventFilters {
            search: self.search.clone(),
            category: self.category,
            is_free: self.is_free,
            start_from: self.start_from,
            start_to: self.start_to,
            location: self.location.clone(),
            featured: self.featured,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub recorded: bool,
    pub view_count: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub event: Event,
    pub available_actions: Vec<StatusAction>,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedRequest {
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct TopEventsParams {
    #[serde(default = "default_top_limit")]
    pub limit: usize,
}

fn default_top_limit() -> usize {
    10
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Session
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/refresh", post(refresh))
        // Public events
        .route("/events", get(list_events))
        .route("/events/:id", get(get_event))
        .route("/events/:id/views", post(record_view))
        .route(
            "/events/:id/registration",
            post(register_for_event).delete(unregister_from_event),
        )
        .route(
            "/events/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        // Signed-in user
        .route("/me/profile", patch(update_profile))
        .route("/me/favorites", get(my_favorites))
        .route("/me/registrations", get(my_registrations))
        // Organizer
        .route("/organizer/events", get(organizer_events).post(create_event))
        .route(
            "/organizer/events/:id",
            patch(update_event).delete(delete_event),
        )
        .route("/organizer/stats", get(organizer_stats))
        // Admin
        .route("/admin/events", get(admin_events))
        .route("/admin/events/top", get(top_events))
        .route("/admin/events/:id/status", post(change_status))
        .route("/admin/events/:id/featured", put(set_featured))
        .route("/admin/users", get(list_accounts))
        .route("/admin/users/:id/activate", post(activate_account))
        .route("/admin/users/:id/deactivate", post(deactivate_account))
        .route("/admin/stats", get(admin_stats))
}

// =========================================================================
// Session
// =========================================================================

async fn register(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<RegisterCommand>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let account = state.accounts.register(command, &context).await?;
    state.cache.invalidate(&keys::accounts());
    Ok((StatusCode::CREATED, Json(account)))
}

async fn login(
    Extension(session): Extension<SessionHandle>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<Account>> {
    let mut session = session.0.lock().await;
    let account = session.login(&credentials.email, &credentials.password).await?;
    Ok(Json(account))
}

/// Always succeeds; the client must follow the redirect with a full load
async fn logout(Extension(session): Extension<SessionHandle>) -> Redirect {
    let reset = session.0.lock().await.logout().await;
    Redirect::to(reset.location)
}

async fn me(Extension(session): Extension<SessionHandle>) -> AppResult<Json<AuthStatus>> {
    let status = session.0.lock().await.load().await?;
    Ok(Json(status))
}

async fn refresh(Extension(session): Extension<SessionHandle>) -> AppResult<Json<AuthStatus>> {
    let status = session.0.lock().await.refresh().await?;
    Ok(Json(status))
}

// =========================================================================
// Public events
// =========================================================================

async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
) -> AppResult<Json<ListResponse<Event>>> {
    let limit = state.config.page_size(params.limit);
    let query = ListEventsQuery::new(params.filters(), limit).with_offset(params.offset);
    let page = state.events.list_events(query).await?;
    Ok(Json(ListResponse::from_page(page, params.offset, limit)))
}

async fn get_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<Json<EventDetail>> {
    Ok(Json(state.events.event_detail(&id, &context).await?))
}

/// Best-effort: answers 202 whether or not the view was stored
async fn record_view(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ViewResponse>) {
    let mut command = RecordViewCommand::new(id);
    if let Some(user) = context.caller_id() {
        command = command.with_user(user);
    }
    if let Some(ip) = context.client_ip {
        command = command.with_ip(ip.to_string());
    }

    let view_count = state.events.record_event_view(command).await;
    (
        StatusCode::ACCEPTED,
        Json(ViewResponse {
            recorded: view_count.is_some(),
            view_count,
        }),
    )
}

async fn register_for_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Registration>)> {
    let registration = state.events.register_for_event(&id, &context).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn unregister_from_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.events.unregister_from_event(&id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_favorite(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<Json<Favorite>> {
    Ok(Json(state.events.add_to_favorites(&id, &context).await?))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.events.remove_from_favorites(&id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Signed-in user
// =========================================================================

async fn update_profile(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Extension(session): Extension<SessionHandle>,
    Json(changes): Json<ProfileChanges>,
) -> AppResult<Json<Account>> {
    let account = state.accounts.update_profile(changes, &context).await?;
    state.cache.invalidate(&keys::accounts());

    // Re-read so the mirror carries the new profile
    if let Err(e) = session.0.lock().await.refresh().await {
        tracing::warn!(user_id = %account.id, error = %e, "Failed to refresh session after profile update");
    }
    Ok(Json(account))
}

async fn my_favorites(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<ListResponse<Event>>> {
    let limit = state.config.page_size(params.limit);
    let page = state.events.user_favorites(limit, params.offset, &context).await?;
    Ok(Json(ListResponse::from_page(page, params.offset, limit)))
}

async fn my_registrations(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<ListResponse<RegisteredEvent>>> {
    let limit = state.config.page_size(params.limit);
    let page = state
        .events
        .user_registrations(limit, params.offset, &context)
        .await?;
    Ok(Json(ListResponse::from_page(page, params.offset, limit)))
}

// =========================================================================
// Organizer
// =========================================================================

async fn organizer_events(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(mut query): Query<ManagedEventsQuery>,
) -> AppResult<Json<ListResponse<Event>>> {
    let limit = state.config.page_size(query.limit);
    query.limit = Some(limit);
    let offset = query.offset;
    let page = state.events.organizer_events(query, &context).await?;
    Ok(Json(ListResponse::from_page(page, offset, limit)))
}

async fn create_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(content): Json<NewEvent>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let event = state.events.create_event(content, &context).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
    Json(patch): Json<EventPatch>,
) -> AppResult<Json<Event>> {
    Ok(Json(state.events.update_event(&id, patch, &context).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.events.delete_event(&id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn organizer_stats(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<OrganizerStats>> {
    let caller = context.require_role(&[Role::Organizer, Role::Admin])?;
    Ok(Json(state.projection.organizer_stats(&caller.id).await?))
}

// =========================================================================
// Admin
// =========================================================================

async fn admin_events(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(mut query): Query<ManagedEventsQuery>,
) -> AppResult<Json<ListResponse<Event>>> {
    let limit = state.config.page_size(query.limit);
    query.limit = Some(limit);
    let offset = query.offset;
    let page = state.events.admin_events(query, &context).await?;
    Ok(Json(ListResponse::from_page(page, offset, limit)))
}

async fn top_events(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(params): Query<TopEventsParams>,
) -> AppResult<Json<Vec<Event>>> {
    context.require_admin()?;
    let limit = params.limit.clamp(1, state.config.max_page_size);
    Ok(Json(state.projection.top_events(limit).await?))
}

async fn change_status(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
    Json(action): Json<StatusAction>,
) -> AppResult<Json<StatusResponse>> {
    let event = state.events.change_status(&id, action, &context).await?;
    Ok(Json(StatusResponse {
        available_actions: available_actions(event.status),
        event,
    }))
}

async fn set_featured(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
    Json(request): Json<FeaturedRequest>,
) -> AppResult<Json<Event>> {
    Ok(Json(
        state
            .events
            .set_featured(&id, request.featured, &context)
            .await?,
    ))
}

async fn list_accounts(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(mut query): Query<ListAccountsQuery>,
) -> AppResult<Json<ListResponse<Account>>> {
    context.require_admin()?;
    let limit = state.config.page_size(query.limit);
    query.limit = Some(limit);
    let offset = query.offset;

    let key = keys::page(keys::accounts(), &query);
    let page = state
        .cache
        .fetch(key, state.config.query_cache_ttl, || {
            state.accounts.list(query.clone(), &context)
        })
        .await?;
    Ok(Json(ListResponse::from_page(page, offset, limit)))
}

async fn set_account_active(
    state: &AppState,
    context: &OperationContext,
    id: &str,
    active: bool,
) -> AppResult<Account> {
    let account = state.accounts.set_active(id, active, context).await?;
    state.cache.invalidate(&keys::accounts());
    // Sessions of this account must see the change on their next request
    state.cache.invalidate(&keys::identity_all());
    Ok(account)
}

async fn activate_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<Json<Account>> {
    Ok(Json(set_account_active(&state, &context, &id, true).await?))
}

async fn deactivate_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> AppResult<Json<Account>> {
    Ok(Json(set_account_active(&state, &context, &id, false).await?))
}

async fn admin_stats(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<AdminStats>> {
    context.require_admin()?;
    Ok(Json(state.projection.admin_stats().await?))
}
