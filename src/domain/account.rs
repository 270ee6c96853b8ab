//! Account types
//!
//! Profile records for registered identities, plus the classification of
//! a provider session into an authentication status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Organizer,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Organizer => "ORGANIZER",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account profile document (collection `users`).
///
/// The document id is the identity provider's id for the same person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Admins may always sign in; everyone else needs activation
    pub fn can_sign_in(&self) -> bool {
        self.is_admin() || self.is_active
    }
}

/// Attributes written when an account is created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

impl NewAccount {
    /// Build the profile for a registration.
    ///
    /// The very first account becomes an active ADMIN; every later account
    /// keeps its requested role and waits for activation.
    pub fn for_registration(name: String, email: String, requested: Role, is_first: bool) -> Self {
        let role = if is_first { Role::Admin } else { requested };
        Self {
            name,
            email,
            role,
            is_active: role == Role::Admin,
        }
    }
}

/// Self-service profile changes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.bio.is_none() && self.avatar_url.is_none()
    }
}

/// Public view of an organizer shown on event pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerProfile {
    pub id: String,
    pub name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&Account> for OrganizerProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            bio: account.bio.clone(),
            avatar_url: account.avatar_url.clone(),
        }
    }
}

/// Who the current session belongs to
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    /// No session
    Anonymous,
    /// Valid credentials, but a non-admin account not yet activated
    PendingActivation,
    Active(Account),
}

impl AuthStatus {
    /// Classify the account behind a session
    pub fn classify(account: Option<Account>) -> Self {
        match account {
            None => AuthStatus::Anonymous,
            Some(account) if account.can_sign_in() => AuthStatus::Active(account),
            Some(_) => AuthStatus::PendingActivation,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            AuthStatus::Active(account) => Some(account),
            _ => None,
        }
    }

    pub fn into_account(self) -> Option<Account> {
        match self {
            AuthStatus::Active(account) => Some(account),
            _ => None,
        }
    }
}

// `null`, `{"notActivated":true}` or the account itself
impl Serialize for AuthStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AuthStatus::Anonymous => serializer.serialize_none(),
            AuthStatus::PendingActivation => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("notActivated", &true)?;
                map.end()
            }
            AuthStatus::Active(account) => account.serialize(serializer),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn account(id: &str, role: Role, is_active: bool) -> Account {
        let now = Utc::now();
        Account {
            id: id.to_string(),
            name: format!("{} name", id),
            email: format!("{}@example.com", id),
            role,
            is_active,
            phone: None,
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}
