//! Command definitions
//!
//! Commands represent intentions to change the system state; queries carry
//! list parameters.

use serde::{Deserialize, Serialize};

use crate::domain::{EventFilters, EventStatus, Registration, Event, Role};

// =========================================================================
// Accounts
// =========================================================================

/// Command to register a new account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCommand {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

impl RegisterCommand {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role: Role::User,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Email and password
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Admin account listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAccountsQuery {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

// =========================================================================
// Events
// =========================================================================

/// Public event listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListEventsQuery {
    pub filters: EventFilters,
    pub limit: usize,
    pub offset: usize,
}

impl ListEventsQuery {
    pub fn new(filters: EventFilters, limit: usize) -> Self {
        Self {
            filters,
            limit,
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Organizer or admin listing over every status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEventsQuery {
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ManagedEventsQuery {
    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = Some(status);
        self
    }
}

// =========================================================================
// Engagement
// =========================================================================

/// Command to record a page view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordViewCommand {
    pub event_id: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

impl RecordViewCommand {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            user_id: None,
            ip_address: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

/// A registration together with its event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredEvent {
    pub registration: Registration,
    pub event: Event,
}
