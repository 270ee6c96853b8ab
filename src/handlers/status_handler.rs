//! Status Handler
//!
//! Admin moderation: lifecycle transitions and the featured flag.

use std::sync::Arc;

use serde_json::Map;

use crate::domain::{transition, Event, OperationContext, StatusAction};
use crate::error::{AppError, AppResult};
use crate::store::{Collection, DocumentStore};

/// Handler for admin status changes
#[derive(Clone)]
pub struct StatusHandler {
    store: Arc<dyn DocumentStore>,
}

impl StatusHandler {
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

    /// Apply a lifecycle action. Only `status` is written.
    ///
    /// Last write wins between concurrent admins.
    pub async fn change_status(
        &self,
        event_id: &str,
        action: StatusAction,
        context: &OperationContext,
    ) -> AppResult<Event> {
        let admin = context.require_admin()?;
        let event = self.load_event(event_id).await?;
        let to = transition(event.status, action)?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), to.as_str().into());
        let updated: Event = self
            .store
            .update(Collection::Events, event_id, patch)
            .await?
            .decode()?;

        tracing::info!(
            event_id = %event_id,
            from = %event.status,
            to = %to,
            action = %action,
            admin_id = %admin.id,
            "Event status changed"
        );
        Ok(updated)
    }

    /// Set or clear the featured flag, in any status
    pub async fn set_featured(
        &self,
        event_id: &str,
        featured: bool,
        context: &OperationContext,
    ) -> AppResult<Event> {
        let admin = context.require_admin()?;
        self.load_event(event_id).await?;

        let mut patch = Map::new();
        patch.insert("featured".to_string(), featured.into());
        let updated: Event = self
            .store
            .update(Collection::Events, event_id, patch)
            .await?
            .decode()?;

        tracing::info!(event_id = %event_id, featured, admin_id = %admin.id, "Event featured flag set");
        Ok(updated)
    }
}
