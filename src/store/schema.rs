//! Collection schemas
//!
//! Attribute and index definitions for every collection. The provisioning
//! CLI creates indexes from these; both store backends validate writes
//! against them and enforce the unique indexes.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Collection, Data, StoreError};

/// Attribute value kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String { size: usize },
    Email,
    Enum(&'static [&'static str]),
    Boolean,
    Datetime,
    Integer { min: i64, max: i64 },
    Url,
}

/// Default applied at creation when the attribute is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl DefaultValue {
    fn to_json(self) -> Value {
        match self {
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Int(n) => Value::from(n),
            DefaultValue::Str(s) => Value::String(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub key: &'static str,
    pub kind: AttributeKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub array: bool,
}

const fn attr(key: &'static str, kind: AttributeKind, required: bool) -> Attribute {
    Attribute {
        key,
        kind,
        required,
        default: None,
        array: false,
    }
}

const fn with_default(key: &'static str, kind: AttributeKind, default: DefaultValue) -> Attribute {
    Attribute {
        key,
        kind,
        required: false,
        default: Some(default),
        array: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Key,
    Unique,
    Fulltext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub key: &'static str,
    pub kind: IndexKind,
    pub attributes: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub collection: Collection,
    pub attributes: &'static [Attribute],
    pub indexes: &'static [Index],
}

pub const ROLES: &[&str] = &["ADMIN", "ORGANIZER", "USER"];
pub const EVENT_STATUSES: &[&str] = &["DRAFT", "PUBLISHED", "CANCELLED", "COMPLETED"];
pub const EVENT_CATEGORIES: &[&str] = &[
    "MUSIC",
    "SPORTS",
    "ARTS",
    "FOOD",
    "TECHNOLOGY",
    "BUSINESS",
    "EDUCATION",
    "HEALTH",
    "COMMUNITY",
    "OTHER",
];
pub const REGISTRATION_STATUSES: &[&str] = &["REGISTERED", "ATTENDED", "CANCELLED"];

const ID: AttributeKind = AttributeKind::String { size: 64 };

pub const USERS: CollectionSchema = CollectionSchema {
    collection: Collection::Users,
    attributes: &[
        attr("name", AttributeKind::String { size: 128 }, true),
        attr("email", AttributeKind::Email, true),
        attr("role", AttributeKind::Enum(ROLES), true),
        with_default("isActive", AttributeKind::Boolean, DefaultValue::Bool(false)),
        attr("phone", AttributeKind::String { size: 32 }, false),
        attr("bio", AttributeKind::String { size: 1000 }, false),
        attr("avatarUrl", AttributeKind::Url, false),
    ],
    indexes: &[
        Index { key: "users_email", kind: IndexKind::Unique, attributes: &["email"] },
        Index { key: "users_role", kind: IndexKind::Key, attributes: &["role"] },
        Index { key: "users_active", kind: IndexKind::Key, attributes: &["isActive"] },
    ],
};

pub const EVENTS: CollectionSchema = CollectionSchema {
    collection: Collection::Events,
    attributes: &[
        attr("title", AttributeKind::String { size: 255 }, true),
        attr("description", AttributeKind::String { size: 10000 }, true),
        attr("category", AttributeKind::Enum(EVENT_CATEGORIES), true),
        attr("startDate", AttributeKind::Datetime, true),
        attr("endDate", AttributeKind::Datetime, true),
        attr("location", AttributeKind::String { size: 255 }, true),
        attr("address", AttributeKind::String { size: 500 }, false),
        with_default("isFree", AttributeKind::Boolean, DefaultValue::Bool(true)),
        attr("price", AttributeKind::Integer { min: 0, max: 1_000_000 }, false),
        attr("maxAttendees", AttributeKind::Integer { min: 1, max: 1_000_000 }, false),
        attr("registrationUrl", AttributeKind::Url, false),
        attr("ticketUrl", AttributeKind::Url, false),
        attr("imageUrl", AttributeKind::Url, false),
        with_default("status", AttributeKind::Enum(EVENT_STATUSES), DefaultValue::Str("DRAFT")),
        with_default("featured", AttributeKind::Boolean, DefaultValue::Bool(false)),
        with_default("viewCount", AttributeKind::Integer { min: 0, max: i64::MAX }, DefaultValue::Int(0)),
        attr("organizer", ID, true),
        Attribute {
            key: "tags",
            kind: AttributeKind::String { size: 50 },
            required: false,
            default: None,
            array: true,
        },
    ],
    indexes: &[
        Index { key: "events_title_search", kind: IndexKind::Fulltext, attributes: &["title"] },
        Index { key: "events_status", kind: IndexKind::Key, attributes: &["status"] },
        Index { key: "events_category", kind: IndexKind::Key, attributes: &["category"] },
        Index { key: "events_start", kind: IndexKind::Key, attributes: &["startDate"] },
        Index { key: "events_organizer", kind: IndexKind::Key, attributes: &["organizer"] },
        Index { key: "events_featured", kind: IndexKind::Key, attributes: &["featured"] },
    ],
};

pub const REGISTRATIONS: CollectionSchema = CollectionSchema {
    collection: Collection::Registrations,
    attributes: &[
        attr("event", ID, true),
        attr("user", ID, true),
        with_default(
            "status",
            AttributeKind::Enum(REGISTRATION_STATUSES),
            DefaultValue::Str("REGISTERED"),
        ),
        attr("registeredAt", AttributeKind::Datetime, true),
    ],
    indexes: &[
        Index { key: "registrations_event_user", kind: IndexKind::Unique, attributes: &["event", "user"] },
        Index { key: "registrations_user", kind: IndexKind::Key, attributes: &["user"] },
    ],
};

pub const FAVORITES: CollectionSchema = CollectionSchema {
    collection: Collection::Favorites,
    attributes: &[attr("event", ID, true), attr("user", ID, true)],
    indexes: &[
        Index { key: "favorites_event_user", kind: IndexKind::Unique, attributes: &["event", "user"] },
        Index { key: "favorites_user", kind: IndexKind::Key, attributes: &["user"] },
    ],
};

pub const VIEWS: CollectionSchema = CollectionSchema {
    collection: Collection::Views,
    attributes: &[
        attr("event", ID, true),
        attr("user", ID, false),
        attr("viewedAt", AttributeKind::Datetime, true),
        attr("ipAddress", AttributeKind::String { size: 45 }, false),
    ],
    indexes: &[
        Index { key: "views_event", kind: IndexKind::Key, attributes: &["event"] },
        Index { key: "views_viewed_at", kind: IndexKind::Key, attributes: &["viewedAt"] },
    ],
};

/// All collection schemas, in provisioning order
pub const ALL: [CollectionSchema; 5] = [USERS, EVENTS, REGISTRATIONS, FAVORITES, VIEWS];

/// Look up the schema of a collection
pub fn for_collection(collection: Collection) -> &'static CollectionSchema {
    match collection {
        Collection::Users => &USERS,
        Collection::Events => &EVENTS,
        Collection::Registrations => &REGISTRATIONS,
        Collection::Favorites => &FAVORITES,
        Collection::Views => &VIEWS,
    }
}

impl CollectionSchema {
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }

    pub fn unique_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter().filter(|i| i.kind == IndexKind::Unique)
    }

    /// Fill in defaults for absent attributes
    pub fn apply_defaults(&self, data: &mut Data) {
        for attribute in self.attributes {
            if let Some(default) = attribute.default {
                let absent = data.get(attribute.key).map_or(true, Value::is_null);
                if absent {
                    data.insert(attribute.key.to_string(), default.to_json());
                }
            }
        }
    }

    /// Validate a complete document (on create)
    pub fn validate(&self, data: &Data) -> Result<(), StoreError> {
        for attribute in self.attributes.iter().filter(|a| a.required) {
            if data.get(attribute.key).map_or(true, Value::is_null) {
                return Err(StoreError::invalid(
                    self.collection,
                    format!("missing required attribute '{}'", attribute.key),
                ));
            }
        }
        self.validate_values(data)
    }

    /// Validate the attributes present in `data` (on update)
    pub fn validate_values(&self, data: &Data) -> Result<(), StoreError> {
        for (key, value) in data {
            if value.is_null() {
                if self.attribute(key).map_or(false, |a| a.required) {
                    return Err(StoreError::invalid(
                        self.collection,
                        format!("attribute '{}' cannot be null", key),
                    ));
                }
                continue;
            }

            let Some(attribute) = self.attribute(key) else {
                return Err(StoreError::invalid(
                    self.collection,
                    format!("unknown attribute '{}'", key),
                ));
            };

            let valid = if attribute.array {
                value
                    .as_array()
                    .map_or(false, |items| items.iter().all(|v| kind_accepts(attribute.kind, v)))
            } else {
                kind_accepts(attribute.kind, value)
            };

            if !valid {
                return Err(StoreError::invalid(
                    self.collection,
                    format!("invalid value for '{}'", key),
                ));
            }
        }
        Ok(())
    }
}

fn kind_accepts(kind: AttributeKind, value: &Value) -> bool {
    match kind {
        AttributeKind::String { size } => value.as_str().map_or(false, |s| s.chars().count() <= size),
        AttributeKind::Email => value
            .as_str()
            .map_or(false, |s| s.len() <= 254 && s.split_once('@').map_or(false, |(l, d)| !l.is_empty() && d.contains('.'))),
        AttributeKind::Enum(values) => value.as_str().map_or(false, |s| values.contains(&s)),
        AttributeKind::Boolean => value.is_boolean(),
        AttributeKind::Datetime => value
            .as_str()
            .map_or(false, |s| s.parse::<DateTime<Utc>>().is_ok()),
        AttributeKind::Integer { min, max } => value.as_i64().map_or(false, |n| n >= min && n <= max),
        AttributeKind::Url => value
            .as_str()
            .map_or(false, |s| s.starts_with("https://") || s.starts_with("http://")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Data {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_event_defaults() {
        let mut doc = data(json!({ "title": "t" }));
        EVENTS.apply_defaults(&mut doc);

        assert_eq!(doc.get("status"), Some(&json!("DRAFT")));
        assert_eq!(doc.get("featured"), Some(&json!(false)));
        assert_eq!(doc.get("viewCount"), Some(&json!(0)));
    }

    #[test]
    fn test_missing_required_attribute() {
        let doc = data(json!({ "event": "e1" }));
        let err = FAVORITES.validate(&doc).unwrap_err();
        assert!(err.to_string().contains("user"));
    }

    #[test]
    fn test_enum_membership() {
        let doc = data(json!({ "status": "ARCHIVED" }));
        assert!(EVENTS.validate_values(&doc).is_err());

        let doc = data(json!({ "status": "COMPLETED" }));
        assert!(EVENTS.validate_values(&doc).is_ok());
    }

    #[test]
    fn test_tags_are_string_arrays() {
        assert!(EVENTS.validate_values(&data(json!({ "tags": ["jazz", "jazz"] }))).is_ok());
        assert!(EVENTS.validate_values(&data(json!({ "tags": "jazz" }))).is_err());
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let doc = data(json!({ "nickname": "x" }));
        assert!(USERS.validate_values(&doc).is_err());
    }

    #[test]
    fn test_unique_indexes() {
        let keys: Vec<_> = ALL
            .iter()
            .flat_map(|s| s.unique_indexes().map(|i| i.key))
            .collect();
        assert_eq!(
            keys,
            vec!["users_email", "registrations_event_user", "favorites_event_user"]
        );
    }
}
