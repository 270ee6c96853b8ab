//! Engagement Handler
//!
//! Registrations, favorites and view recording.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    DomainError, Event, Favorite, OperationContext, Page, Registration, RegistrationStatus,
    ViewRecord,
};
use crate::error::{AppError, AppResult};
use crate::store::{to_data, Collection, DocumentStore, Filter, Query, StoreError};

use super::event_handler::accepts_registrations;
use super::{count, find_first, RecordViewCommand, RegisteredEvent};

/// Handler for per-user links to events
#[derive(Clone)]
pub struct EngagementHandler {
    store: Arc<dyn DocumentStore>,
}

fn pair(event_id: &str, user_id: &str) -> Vec<Filter> {
    vec![Filter::equal("event", event_id), Filter::equal("user", user_id)]
}

impl EngagementHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn load_event(&self, id: &str) -> AppResult<Event> {
        let document = self
            .store
            .get(Collection::Events, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("event {}", id)))?;
        Ok(document.decode()?)
    }

    // ===== Registrations =====

    /// Register the caller for a published event
    pub async fn register_for_event(
        &self,
        event_id: &str,
        context: &OperationContext,
    ) -> AppResult<Registration> {
        let caller = context.require_account()?;
        let event = self.load_event(event_id).await?;
        if !accepts_registrations(&event) {
            return Err(DomainError::validation(format!(
                "event is {} and not open for registration",
                event.status
            ))
            .into());
        }

        if let Some(capacity) = event.max_attendees {
            let taken = count(
                self.store.as_ref(),
                Collection::Registrations,
                vec![
                    Filter::equal("event", event_id),
                    Filter::equal("status", RegistrationStatus::Registered.as_str()),
                ],
            )
            .await?;
            if taken >= capacity as u64 {
                return Err(DomainError::validation("event is full").into());
            }
        }

        let record = Registration::record(event_id, &caller.id, Utc::now());
        let document = self
            .store
            .create(Collection::Registrations, None, to_data(&record)?)
            .await?;

        tracing::info!(event_id = %event_id, user_id = %caller.id, "Registered for event");
        Ok(document.decode()?)
    }

    /// Remove the caller's registration; no registration is a no-op
    pub async fn unregister_from_event(
        &self,
        event_id: &str,
        context: &OperationContext,
    ) -> AppResult<()> {
        let caller = context.require_account()?;
        let existing = find_first(
            self.store.as_ref(),
            Collection::Registrations,
            pair(event_id, &caller.id),
        )
        .await?;

        if let Some(document) = existing {
            self.store.delete(Collection::Registrations, &document.id).await?;
            tracing::info!(event_id = %event_id, user_id = %caller.id, "Unregistered from event");
        }
        Ok(())
    }

    /// The caller's registrations with their events, newest first.
    ///
    /// Registrations whose event no longer exists are skipped.
    pub async fn user_registrations(
        &self,
        limit: usize,
        offset: usize,
        context: &OperationContext,
    ) -> AppResult<Page<RegisteredEvent>> {
        let caller = context.require_account()?;
        let query = Query::new()
            .filter(Filter::equal("user", caller.id.as_str()))
            .limit(limit)
            .offset(offset);
        let list = self.store.list(Collection::Registrations, &query).await?;

        let mut items = Vec::with_capacity(list.documents.len());
        for registration in list.decode::<Registration>()? {
            if let Some(document) = self.store.get(Collection::Events, &registration.event).await? {
                items.push(RegisteredEvent {
                    registration,
                    event: document.decode()?,
                });
            }
        }
        Ok(Page::new(items, list.total))
    }

    // ===== Favorites =====

    /// Favorite an event. Favoriting twice returns the existing record.
    pub async fn add_to_favorites(
        &self,
        event_id: &str,
        context: &OperationContext,
    ) -> AppResult<Favorite> {
        let caller = context.require_account()?;
        self.load_event(event_id).await?;

        let existing =
            find_first(self.store.as_ref(), Collection::Favorites, pair(event_id, &caller.id))
                .await?;
        if let Some(document) = existing {
            return Ok(document.decode()?);
        }

        let mut data = crate::store::Data::new();
        data.insert("event".to_string(), event_id.into());
        data.insert("user".to_string(), caller.id.as_str().into());

        match self.store.create(Collection::Favorites, None, data).await {
            Ok(document) => Ok(document.decode()?),
            // Lost a race with a concurrent add: the index kept one record
            Err(StoreError::Conflict { .. }) => {
                let document = find_first(
                    self.store.as_ref(),
                    Collection::Favorites,
                    pair(event_id, &caller.id),
                )
                .await?
                .ok_or_else(|| AppError::Internal("favorite vanished after conflict".to_string()))?;
                Ok(document.decode()?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a favorite; a missing favorite is a no-op
    pub async fn remove_from_favorites(
        &self,
        event_id: &str,
        context: &OperationContext,
    ) -> AppResult<()> {
        let caller = context.require_account()?;
        let existing =
            find_first(self.store.as_ref(), Collection::Favorites, pair(event_id, &caller.id))
                .await?;

        if let Some(document) = existing {
            self.store.delete(Collection::Favorites, &document.id).await?;
        }
        Ok(())
    }

    /// The caller's favorited events, most recently favorited first
    pub async fn user_favorites(
        &self,
        limit: usize,
        offset: usize,
        context: &OperationContext,
    ) -> AppResult<Page<Event>> {
        let caller = context.require_account()?;
        let query = Query::new()
            .filter(Filter::equal("user", caller.id.as_str()))
            .limit(limit)
            .offset(offset);
        let list = self.store.list(Collection::Favorites, &query).await?;

        let mut items = Vec::with_capacity(list.documents.len());
        for favorite in list.decode::<Favorite>()? {
            if let Some(document) = self.store.get(Collection::Events, &favorite.event).await? {
                items.push(document.decode()?);
            }
        }
        Ok(Page::new(items, list.total))
    }

    // ===== Views =====

    /// Append a view record and bump the event's counter.
    ///
    /// Best effort: failures are logged and never returned. Yields the new
    /// view count when both writes succeed.
    pub async fn record_event_view(&self, command: RecordViewCommand) -> Option<i64> {
        match self.try_record_view(&command).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(
                    event_id = %command.event_id,
                    error = %e,
                    "Failed to record event view"
                );
                None
            }
        }
    }

    async fn try_record_view(&self, command: &RecordViewCommand) -> AppResult<i64> {
        self.load_event(&command.event_id).await?;

        let view = ViewRecord {
            event: command.event_id.clone(),
            user: command.user_id.clone(),
            viewed_at: Utc::now(),
            ip_address: command.ip_address.clone(),
        };
        self.store
            .create(Collection::Views, None, to_data(&view)?)
            .await?;

        Ok(self
            .store
            .increment(Collection::Events, &command.event_id, "viewCount", 1)
            .await?)
    }
}
