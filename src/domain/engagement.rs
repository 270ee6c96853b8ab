//! Registrations, favorites and view records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration status, upper-case like every other stored enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Registered,
    Attended,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "REGISTERED",
            RegistrationStatus::Attended => "ATTENDED",
            RegistrationStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Account-to-event registration (collection `registrations`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(rename = "$id")]
    pub id: String,
    pub event: String,
    pub user: String,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Registration {
    /// Attributes of a new registration
    pub fn record(event: &str, user: &str, at: DateTime<Utc>) -> serde_json::Value {
        serde_json::json!({
            "event": event,
            "user": user,
            "status": RegistrationStatus::Registered,
            "registeredAt": at,
        })
    }
}

/// Account-to-event favorite (collection `favorites`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(rename = "$id")]
    pub id: String,
    pub event: String,
    pub user: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Append-only view log entry (collection `views`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecord {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub viewed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}
