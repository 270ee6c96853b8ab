//! Projection Service
//!
//! Read models computed from the document store on demand: organizer and
//! admin dashboards plus view analytics.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Event, EventStatus, RegistrationStatus, Role};
use crate::store::{Bound, Collection, DocumentStore, Filter, Order, Query, StoreError};

/// Organizer dashboard figures
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerStats {
    pub total_events: u64,
    /// Keyed by upper-case status
    pub events_by_status: BTreeMap<String, u64>,
    pub total_views: i64,
    pub total_registrations: u64,
}

/// Admin dashboard figures
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_accounts: u64,
    pub accounts_by_role: BTreeMap<String, u64>,
    pub pending_activations: u64,
    pub total_events: u64,
    pub events_by_status: BTreeMap<String, u64>,
    pub featured_events: u64,
}

/// Projection Service for dashboards
#[derive(Clone)]
pub struct ProjectionService {
    store: Arc<dyn DocumentStore>,
}

impl ProjectionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn count(&self, collection: Collection, filters: Vec<Filter>) -> Result<u64, StoreError> {
        let list = self
            .store
            .list(collection, &Query::new().filters(filters).count_only())
            .await?;
        Ok(list.total)
    }

    // =========================================================================
    // Organizer dashboard
    // =========================================================================

    /// Figures over every event owned by `organizer`, in any status
    pub async fn organizer_stats(&self, organizer: &str) -> Result<OrganizerStats, StoreError> {
        let events: Vec<Event> = self
            .store
            .list(
                Collection::Events,
                &Query::new().filter(Filter::equal("organizer", organizer)),
            )
            .await?
            .decode()?;

        let mut events_by_status = zeroed_statuses();
        let mut total_views = 0;
        let mut total_registrations = 0;
        for event in &events {
            *events_by_status
                .entry(event.status.as_str().to_string())
                .or_insert(0) += 1;
            total_views += event.view_count;
            total_registrations += self
                .count(
                    Collection::Registrations,
                    vec![
                        Filter::equal("event", event.id.as_str()),
                        Filter::equal("status", RegistrationStatus::Registered.as_str()),
                    ],
                )
                .await?;
        }

        tracing::debug!(organizer = %organizer, events = events.len(), "Organizer stats computed");

        Ok(OrganizerStats {
            total_events: events.len() as u64,
            events_by_status,
            total_views,
            total_registrations,
        })
    }

    // =========================================================================
    // Admin dashboard
    // =========================================================================

    pub async fn admin_stats(&self) -> Result<AdminStats, StoreError> {
        let mut accounts_by_role = BTreeMap::new();
        let mut total_accounts = 0;
        for role in [Role::Admin, Role::Organizer, Role::User] {
            let n = self
                .count(Collection::Users, vec![Filter::equal("role", role.as_str())])
                .await?;
            accounts_by_role.insert(role.as_str().to_string(), n);
            total_accounts += n;
        }
        let pending_activations = self
            .count(Collection::Users, vec![Filter::equal("isActive", false)])
            .await?;

        let mut events_by_status = BTreeMap::new();
        let mut total_events = 0;
        for status in EventStatus::ALL {
            let n = self
                .count(Collection::Events, vec![Filter::equal("status", status.as_str())])
                .await?;
            events_by_status.insert(status.as_str().to_string(), n);
            total_events += n;
        }
        let featured_events = self
            .count(Collection::Events, vec![Filter::equal("featured", true)])
            .await?;

        Ok(AdminStats {
            total_accounts,
            accounts_by_role,
            pending_activations,
            total_events,
            events_by_status,
            featured_events,
        })
    }

    // =========================================================================
    // View analytics
    // =========================================================================

    /// Published events with the most views first
    pub async fn top_events(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        self.store
            .list(
                Collection::Events,
                &Query::new()
                    .filter(Filter::equal("status", EventStatus::Published.as_str()))
                    .order(Order::FieldDesc("viewCount".to_string()))
                    .limit(limit),
            )
            .await?
            .decode()
    }

    /// View records for `event` at or after `since`
    pub async fn views_since(&self, event: &str, since: DateTime<Utc>) -> Result<u64, StoreError> {
        self.count(
            Collection::Views,
            vec![
                Filter::equal("event", event),
                Filter::gte("viewedAt", Bound::Date(since)),
            ],
        )
        .await
    }
}

fn zeroed_statuses() -> BTreeMap<String, u64> {
    EventStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::fixtures::account;
    use crate::domain::event::fixtures::new_event;
    use crate::domain::{OperationContext, StatusAction};
    use crate::handlers::{EngagementHandler, EventHandler, RecordViewCommand, StatusHandler};
    use crate::store::{to_data, MemoryDocumentStore};

    struct Fixture {
        store: Arc<dyn DocumentStore>,
        events: EventHandler,
        status: StatusHandler,
        engagement: EngagementHandler,
        projection: ProjectionService,
        admin: OperationContext,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        Fixture {
            events: EventHandler::new(store.clone()),
            status: StatusHandler::new(store.clone()),
            engagement: EngagementHandler::new(store.clone()),
            projection: ProjectionService::new(store.clone()),
            store,
            admin: OperationContext::new().with_caller(account("admin", Role::Admin, true)),
        }
    }

    async fn publish(f: &Fixture, owner: &OperationContext, title: &str) -> Event {
        let event = f.events.create_event(new_event(title), owner).await.unwrap();
        f.status
            .change_status(&event.id, StatusAction::Publish, &f.admin)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_organizer_stats() {
        let f = fixture();
        let organizer = OperationContext::new().with_caller(account("org", Role::Organizer, true));
        let attendee = OperationContext::new().with_caller(account("u1", Role::User, true));

        let live = publish(&f, &organizer, "Live").await;
        f.events.create_event(new_event("Draft"), &organizer).await.unwrap();
        publish(&f, &f.admin, "Not mine").await;

        f.engagement.register_for_event(&live.id, &attendee).await.unwrap();
        for _ in 0..2 {
            f.engagement.record_event_view(RecordViewCommand::new(live.id.as_str())).await;
        }

        let stats = f.projection.organizer_stats("org").await.unwrap();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.events_by_status["DRAFT"], 1);
        assert_eq!(stats.events_by_status["PUBLISHED"], 1);
        assert_eq!(stats.events_by_status["CANCELLED"], 0);
        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.total_registrations, 1);
    }

    #[tokio::test]
    async fn test_admin_stats() {
        let f = fixture();
        for (id, role, active) in [
            ("admin", Role::Admin, true),
            ("org", Role::Organizer, false),
            ("u1", Role::User, true),
        ] {
            let mut data = to_data(&account(id, role, active)).unwrap();
            data.remove("$id");
            f.store
                .create(Collection::Users, Some(id.to_string()), data)
                .await
                .unwrap();
        }
        let event = publish(&f, &f.admin, "Gala").await;
        f.status.set_featured(&event.id, true, &f.admin).await.unwrap();

        let stats = f.projection.admin_stats().await.unwrap();
        assert_eq!(stats.total_accounts, 3);
        assert_eq!(stats.accounts_by_role["ORGANIZER"], 1);
        assert_eq!(stats.pending_activations, 1);
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.featured_events, 1);
    }

    #[tokio::test]
    async fn test_top_events_orders_by_views() {
        let f = fixture();
        let quiet = publish(&f, &f.admin, "Quiet").await;
        let busy = publish(&f, &f.admin, "Busy").await;
        f.events.create_event(new_event("Hidden draft"), &f.admin).await.unwrap();

        for _ in 0..3 {
            f.engagement.record_event_view(RecordViewCommand::new(busy.id.as_str())).await;
        }
        f.engagement.record_event_view(RecordViewCommand::new(quiet.id.as_str())).await;

        let top = f.projection.top_events(10).await.unwrap();
        let ids: Vec<_> = top.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![busy.id.as_str(), quiet.id.as_str()]);

        let recent = f
            .projection
            .views_since(&busy.id, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(recent, 3);
        let future = f
            .projection
            .views_since(&busy.id, Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(future, 0);
    }
}
