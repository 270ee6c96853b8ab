//! Event Handler
//!
//! Listing, detail and organizer-side content management.

use std::sync::Arc;

use crate::domain::{
    Account, DomainError, Event, EventDetail, EventPatch, EventRecord, EventStatus, NewEvent,
    OperationContext, OrganizerProfile, Page, RegistrationStatus, Role,
};
use crate::error::{AppError, AppResult};
use crate::store::{to_data, Collection, DocumentStore, Filter, Query};

use super::{count, delete_matching, find_first, ListEventsQuery, ManagedEventsQuery};

/// Handler for event reads and content writes
#[derive(Clone)]
pub struct EventHandler {
    store: Arc<dyn DocumentStore>,
}

impl EventHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Published events matching the filters, newest first
    pub async fn list_events(&self, query: ListEventsQuery) -> AppResult<Page<Event>> {
        let store_query = Query::new()
            .filters(query.filters.to_filters())
            .limit(query.limit)
            .offset(query.offset);

        let list = self.store.list(Collection::Events, &store_query).await?;
        Ok(Page::new(list.decode()?, list.total))
    }

    /// Load an event regardless of status
    pub async fn get_event(&self, id: &str) -> AppResult<Event> {
        let document = self
            .store
            .get(Collection::Events, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("event {}", id)))?;
        Ok(document.decode()?)
    }

    /// Event page data.
    ///
    /// Reads are sequential and unsynchronized: event, organizer,
    /// registration count, then the caller's registration and favorite.
    /// Unpublished events are only visible to their organizer and admins.
    pub async fn get_event_detail(
        &self,
        id: &str,
        context: &OperationContext,
    ) -> AppResult<EventDetail> {
        let event = self.get_event(id).await?;
        if !event.is_published() && !can_manage(context.caller.as_ref(), &event) {
            return Err(AppError::not_found(format!("event {}", id)));
        }

        let organizer = self
            .store
            .get(Collection::Users, &event.organizer)
            .await?
            .map(|d| d.decode::<Account>())
            .transpose()?
            .map(|account| OrganizerProfile::from(&account));

        let registration_count = count(
            self.store.as_ref(),
            Collection::Registrations,
            vec![
                Filter::equal("event", id),
                Filter::equal("status", RegistrationStatus::Registered.as_str()),
            ],
        )
        .await?;

        let (is_user_registered, is_user_favorite) = match context.caller_id() {
            Some(user) => {
                let pair = vec![Filter::equal("event", id), Filter::equal("user", user)];
                let registered =
                    find_first(self.store.as_ref(), Collection::Registrations, pair.clone()).await?;
                let favorite = find_first(self.store.as_ref(), Collection::Favorites, pair).await?;
                (registered.is_some(), favorite.is_some())
            }
            None => (false, false),
        };

        Ok(EventDetail {
            event,
            organizer,
            registration_count,
            is_user_registered,
            is_user_favorite,
        })
    }

    /// Create an event owned by the caller; always starts as an unfeatured draft
    pub async fn create_event(
        &self,
        content: NewEvent,
        context: &OperationContext,
    ) -> AppResult<Event> {
        let caller = context.require_role(&[Role::Organizer, Role::Admin])?;
        let content = content.validate()?;

        let record = EventRecord::draft(content, caller.id.clone());
        let document = self
            .store
            .create(Collection::Events, None, to_data(&record)?)
            .await?;

        let event: Event = document.decode()?;
        tracing::info!(
            event_id = %event.id,
            organizer = %event.organizer,
            "Event created"
        );
        Ok(event)
    }

    /// Change event content (owning organizer or admin)
    pub async fn update_event(
        &self,
        id: &str,
        patch: EventPatch,
        context: &OperationContext,
    ) -> AppResult<Event> {
        let caller = context.require_account()?;
        let event = self.get_event(id).await?;
        authorize_manage(caller, &event)?;
        patch.validate_against(&event)?;

        let mut data = to_data(&patch)?;
        if patch.makes_free() {
            data.insert("price".to_string(), serde_json::Value::Null);
        }
        if let Some(title) = &patch.title {
            data.insert("title".to_string(), title.trim().into());
        }
        if data.is_empty() {
            return Ok(event);
        }

        let document = self.store.update(Collection::Events, id, data).await?;
        tracing::info!(event_id = %id, editor = %caller.id, "Event updated");
        Ok(document.decode()?)
    }

    /// Delete an event (owning organizer or admin)
    ///
    /// Registrations, favorites and views of the event go with it.
    pub async fn delete_event(&self, id: &str, context: &OperationContext) -> AppResult<()> {
        let caller = context.require_account()?;
        let event = self.get_event(id).await?;
        authorize_manage(caller, &event)?;

        let store = self.store.as_ref();
        let of_event = || vec![Filter::equal("event", id)];
        let registrations = delete_matching(store, Collection::Registrations, of_event()).await?;
        let favorites = delete_matching(store, Collection::Favorites, of_event()).await?;
        let views = delete_matching(store, Collection::Views, of_event()).await?;

        self.store.delete(Collection::Events, id).await?;
        tracing::info!(
            event_id = %id,
            deleted_by = %caller.id,
            registrations,
            favorites,
            views,
            "Event deleted"
        );
        Ok(())
    }

    /// The caller's own events in every status
    pub async fn organizer_events(
        &self,
        query: ManagedEventsQuery,
        context: &OperationContext,
    ) -> AppResult<Page<Event>> {
        let caller = context.require_role(&[Role::Organizer, Role::Admin])?;
        let organizer = Filter::equal("organizer", caller.id.as_str());
        self.managed_events(query, Some(organizer)).await
    }

    /// Every event in every status (admin only)
    pub async fn admin_events(
        &self,
        query: ManagedEventsQuery,
        context: &OperationContext,
    ) -> AppResult<Page<Event>> {
        context.require_admin()?;
        self.managed_events(query, None).await
    }

    async fn managed_events(
        &self,
        query: ManagedEventsQuery,
        scope: Option<Filter>,
    ) -> AppResult<Page<Event>> {
        let mut store_query = Query::new().offset(query.offset).filters(scope);
        if let Some(limit) = query.limit {
            store_query = store_query.limit(limit);
        }
        if let Some(status) = query.status {
            store_query = store_query.filter(Filter::equal("status", status.as_str()));
        }
        if let Some(featured) = query.featured {
            store_query = store_query.filter(Filter::equal("featured", featured));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            store_query = store_query.filter(Filter::search("title", search));
        }

        let list = self.store.list(Collection::Events, &store_query).await?;
        Ok(Page::new(list.decode()?, list.total))
    }
}

fn can_manage(caller: Option<&Account>, event: &Event) -> bool {
    caller.map_or(false, |c| c.is_admin() || c.id == event.organizer)
}

fn authorize_manage(caller: &Account, event: &Event) -> Result<(), DomainError> {
    if can_manage(Some(caller), event) {
        Ok(())
    } else {
        Err(DomainError::forbidden("only the organizer or an admin can change this event"))
    }
}

/// Whether an event accepts registrations
pub(crate) fn accepts_registrations(event: &Event) -> bool {
    event.status == EventStatus::Published
}
