//! Cache-aware events client
//!
//! Reads go through the [`QueryCache`]; every write re-fetches truth by
//! invalidating the keys it could have made stale.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{
    Event, EventDetail, EventFilters, EventPatch, Favorite, NewEvent, OperationContext, Page,
    Registration, Role, StatusAction,
};
use crate::error::AppResult;
use crate::handlers::{
    EngagementHandler, EventHandler, ListEventsQuery, ManagedEventsQuery, RecordViewCommand,
    RegisteredEvent, StatusHandler,
};
use crate::store::DocumentStore;

use super::{keys, InfinitePages, QueryCache, QueryKey};

/// Events facade used by the HTTP layer
#[derive(Clone)]
pub struct EventsClient {
    cache: Arc<QueryCache>,
    events: EventHandler,
    engagement: EngagementHandler,
    status: StatusHandler,
    stale_time: Duration,
}

impl EventsClient {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<QueryCache>, stale_time: Duration) -> Self {
        Self {
            cache,
            events: EventHandler::new(store.clone()),
            engagement: EngagementHandler::new(store.clone()),
            status: StatusHandler::new(store),
            stale_time,
        }
    }

    fn invalidate(&self, prefixes: &[QueryKey]) {
        for prefix in prefixes {
            self.cache.invalidate(prefix);
        }
    }

    /// Keys an event content or status change can make stale
    ///
    /// Favorite and registration lists embed the event, so they go too.
    fn event_scope(id: &str) -> [QueryKey; 5] {
        [
            keys::event_detail(id),
            keys::event_lists(),
            keys::organizers(),
            keys::admin_events(),
            keys::user_lists(),
        ]
    }

    // ===== Reads =====

    pub async fn list_events(&self, query: ListEventsQuery) -> AppResult<Page<Event>> {
        let key = keys::event_list(&query.filters, query.limit, query.offset);
        self.cache
            .fetch(key, self.stale_time, || self.events.list_events(query))
            .await
    }

    /// Load the next public page into `pages`
    pub async fn load_more(
        &self,
        pages: &mut InfinitePages<Event>,
        filters: &EventFilters,
    ) -> AppResult<bool> {
        pages
            .load_more(|offset, limit| {
                self.list_events(ListEventsQuery::new(filters.clone(), limit).with_offset(offset))
            })
            .await
    }

    pub async fn event_detail(&self, id: &str, context: &OperationContext) -> AppResult<EventDetail> {
        let key = keys::event_detail_for(id, context.caller_id());
        self.cache
            .fetch(key, self.stale_time, || self.events.get_event_detail(id, context))
            .await
    }

    pub async fn organizer_events(
        &self,
        query: ManagedEventsQuery,
        context: &OperationContext,
    ) -> AppResult<Page<Event>> {
        // Authorize before the cache can answer
        let caller = context.require_role(&[Role::Organizer, Role::Admin])?;
        let key = keys::page(keys::organizer_events(&caller.id), &query);
        self.cache
            .fetch(key, self.stale_time, || self.events.organizer_events(query, context))
            .await
    }

    pub async fn admin_events(
        &self,
        query: ManagedEventsQuery,
        context: &OperationContext,
    ) -> AppResult<Page<Event>> {
        context.require_admin()?;
        let key = keys::page(keys::admin_events(), &query);
        self.cache
            .fetch(key, self.stale_time, || self.events.admin_events(query, context))
            .await
    }

    pub async fn user_favorites(
        &self,
        limit: usize,
        offset: usize,
        context: &OperationContext,
    ) -> AppResult<Page<Event>> {
        let caller = context.require_account()?;
        let key = keys::page(keys::user_favorites(&caller.id), &(limit, offset));
        self.cache
            .fetch(key, self.stale_time, || self.engagement.user_favorites(limit, offset, context))
            .await
    }

    pub async fn user_registrations(
        &self,
        limit: usize,
        offset: usize,
        context: &OperationContext,
    ) -> AppResult<Page<RegisteredEvent>> {
        let caller = context.require_account()?;
        let key = keys::page(keys::user_registrations(&caller.id), &(limit, offset));
        self.cache
            .fetch(key, self.stale_time, || {
                self.engagement.user_registrations(limit, offset, context)
            })
            .await
    }

    // ===== Writes =====

    pub async fn create_event(&self, content: NewEvent, context: &OperationContext) -> AppResult<Event> {
        let event = self.events.create_event(content, context).await?;
        self.invalidate(&[keys::organizer_events(&event.organizer), keys::admin_events()]);
        Ok(event)
    }

    pub async fn update_event(
        &self,
        id: &str,
        patch: EventPatch,
        context: &OperationContext,
    ) -> AppResult<Event> {
        let event = self.events.update_event(id, patch, context).await?;
        self.invalidate(&Self::event_scope(id));
        Ok(event)
    }

    pub async fn delete_event(&self, id: &str, context: &OperationContext) -> AppResult<()> {
        self.events.delete_event(id, context).await?;
        self.invalidate(&Self::event_scope(id));
        Ok(())
    }

    pub async fn register_for_event(
        &self,
        id: &str,
        context: &OperationContext,
    ) -> AppResult<Registration> {
        let registration = self.engagement.register_for_event(id, context).await?;
        self.invalidate(&[keys::event_detail(id), keys::user_registrations(&registration.user)]);
        Ok(registration)
    }

    pub async fn unregister_from_event(&self, id: &str, context: &OperationContext) -> AppResult<()> {
        self.engagement.unregister_from_event(id, context).await?;
        if let Some(user) = context.caller_id() {
            self.invalidate(&[keys::event_detail(id), keys::user_registrations(user)]);
        }
        Ok(())
    }

    pub async fn add_to_favorites(&self, id: &str, context: &OperationContext) -> AppResult<Favorite> {
        let favorite = self.engagement.add_to_favorites(id, context).await?;
        self.invalidate(&[keys::event_detail(id), keys::user_favorites(&favorite.user)]);
        Ok(favorite)
    }

    pub async fn remove_from_favorites(&self, id: &str, context: &OperationContext) -> AppResult<()> {
        self.engagement.remove_from_favorites(id, context).await?;
        if let Some(user) = context.caller_id() {
            self.invalidate(&[keys::event_detail(id), keys::user_favorites(user)]);
        }
        Ok(())
    }

    pub async fn change_status(
        &self,
        id: &str,
        action: StatusAction,
        context: &OperationContext,
    ) -> AppResult<Event> {
        let event = self.status.change_status(id, action, context).await?;
        self.invalidate(&Self::event_scope(id));
        Ok(event)
    }

    pub async fn set_featured(
        &self,
        id: &str,
        featured: bool,
        context: &OperationContext,
    ) -> AppResult<Event> {
        let event = self.status.set_featured(id, featured, context).await?;
        self.invalidate(&Self::event_scope(id));
        Ok(event)
    }

    /// Best-effort view counter; cached counts catch up on expiry
    pub async fn record_event_view(&self, command: RecordViewCommand) -> Option<i64> {
        self.engagement.record_event_view(command).await
    }
}
