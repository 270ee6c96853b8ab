//! Query key catalogue
//!
//! Every cached read is keyed here so writes can invalidate by prefix.

use serde::Serialize;

use crate::identity::password::token_digest;

use super::QueryKey;

const ANONYMOUS: &str = "anonymous";

pub fn identity_all() -> QueryKey {
    QueryKey::new(["auth", "identity"])
}

/// Provider read for one session, keyed by the token digest so keys can
/// be logged
pub fn identity(session_id: &str) -> QueryKey {
    identity_all().push(token_digest(session_id))
}

pub fn events() -> QueryKey {
    QueryKey::new(["events"])
}

/// Every public listing page
pub fn event_lists() -> QueryKey {
    events().push("list")
}

/// One public listing page
pub fn event_list<F: Serialize>(filters: &F, limit: usize, offset: usize) -> QueryKey {
    event_lists()
        .push(canonical(filters))
        .push(limit.to_string())
        .push(offset.to_string())
}

/// Every caller's view of one event
pub fn event_detail(id: &str) -> QueryKey {
    events().push("detail").push(id)
}

pub fn event_detail_for(id: &str, caller: Option<&str>) -> QueryKey {
    event_detail(id).push(caller.unwrap_or(ANONYMOUS))
}

/// Every per-user list
pub fn user_lists() -> QueryKey {
    QueryKey::new(["me"])
}

pub fn user_favorites(user: &str) -> QueryKey {
    user_lists().push(user).push("favorites")
}

pub fn user_registrations(user: &str) -> QueryKey {
    user_lists().push(user).push("registrations")
}

/// Every organizer dashboard
pub fn organizers() -> QueryKey {
    QueryKey::new(["organizer"])
}

pub fn organizer_events(organizer: &str) -> QueryKey {
    organizers().push(organizer).push("events")
}

pub fn admin_events() -> QueryKey {
    QueryKey::new(["admin", "events"])
}

pub fn accounts() -> QueryKey {
    QueryKey::new(["admin", "users"])
}

/// Page-specific key under a list prefix
pub fn page<Q: Serialize>(prefix: QueryKey, query: &Q) -> QueryKey {
    prefix.push(canonical(query))
}

// serde_json keeps struct field order, so equal values give equal keys
fn canonical<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
