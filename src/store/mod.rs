//! Document Store module
//!
//! Client for the schema'd document database that owns every EventCity
//! record. Collections hold JSON documents; reads go through [`Query`].

mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use error::StoreError;
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

/// JSON object holding a document's attributes
pub type Data = Map<String, Value>;

/// Named collections of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Events,
    Registrations,
    Favorites,
    Views,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Events,
        Collection::Registrations,
        Collection::Favorites,
        Collection::Views,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Events => "events",
            Collection::Registrations => "registrations",
            Collection::Favorites => "favorites",
            Collection::Views => "views",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection: {}", s))
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub collection: Collection,
    pub data: Data,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Decode into a domain record.
    ///
    /// Metadata is merged into the attributes as `$id`, `$createdAt` and
    /// `$updatedAt` before deserializing.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("$id".to_string(), Value::String(self.id.clone()));
        data.insert("$createdAt".to_string(), serde_json::to_value(self.created_at)?);
        data.insert("$updatedAt".to_string(), serde_json::to_value(self.updated_at)?);
        Ok(serde_json::from_value(Value::Object(data))?)
    }

    /// Read a single attribute as a string
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Read a single attribute as an integer
    pub fn int_attr(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }
}

/// Serialize a value into document attributes.
///
/// Keys starting with `$` are metadata and are never written.
pub fn to_data<T: Serialize>(value: &T) -> Result<Data, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.retain(|k, _| !k.starts_with('$'));
            Ok(map)
        }
        other => Err(StoreError::Serialization(serde::ser::Error::custom(format!(
            "expected a JSON object, got {}",
            other
        )))),
    }
}

/// Typed bound for range filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Bound {
    Date(DateTime<Utc>),
    Int(i64),
}

/// A single query condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Attribute equals the JSON value
    Equal(String, Value),
    /// Every whitespace-separated term occurs in the attribute (case-insensitive)
    Search(String, String),
    /// Attribute contains the text (case-insensitive)
    Contains(String, String),
    GreaterThanEqual(String, Bound),
    LessThanEqual(String, Bound),
}

impl Filter {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Filter::Equal(field.to_string(), value.into())
    }

    pub fn search(field: &str, text: impl Into<String>) -> Self {
        Filter::Search(field.to_string(), text.into())
    }

    pub fn contains(field: &str, text: impl Into<String>) -> Self {
        Filter::Contains(field.to_string(), text.into())
    }

    pub fn gte(field: &str, bound: Bound) -> Self {
        Filter::GreaterThanEqual(field.to_string(), bound)
    }

    pub fn lte(field: &str, bound: Bound) -> Self {
        Filter::LessThanEqual(field.to_string(), bound)
    }

    /// Attribute this condition reads
    pub fn field(&self) -> &str {
        match self {
            Filter::Equal(f, _)
            | Filter::Search(f, _)
            | Filter::Contains(f, _)
            | Filter::GreaterThanEqual(f, _)
            | Filter::LessThanEqual(f, _) => f,
        }
    }

    /// Evaluate against a document's attributes
    pub fn matches(&self, data: &Data) -> bool {
        match self {
            Filter::Equal(field, expected) => data.get(field) == Some(expected),
            Filter::Search(field, text) => match data.get(field).and_then(Value::as_str) {
                Some(haystack) => {
                    let haystack = haystack.to_lowercase();
                    text.split_whitespace()
                        .all(|term| haystack.contains(&term.to_lowercase()))
                }
                None => false,
            },
            Filter::Contains(field, text) => data
                .get(field)
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(&text.to_lowercase()))
                .unwrap_or(false),
            Filter::GreaterThanEqual(field, bound) => {
                compare(data.get(field), bound).map_or(false, |o| o.is_ge())
            }
            Filter::LessThanEqual(field, bound) => {
                compare(data.get(field), bound).map_or(false, |o| o.is_le())
            }
        }
    }
}

fn compare(value: Option<&Value>, bound: &Bound) -> Option<std::cmp::Ordering> {
    let value = value?;
    match bound {
        Bound::Date(date) => {
            let parsed = value.as_str()?.parse::<DateTime<Utc>>().ok()?;
            Some(parsed.cmp(date))
        }
        Bound::Int(n) => Some(value.as_i64()?.cmp(n)),
    }
}

/// Result ordering
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    CreatedDesc,
    CreatedAsc,
    FieldAsc(String),
    FieldDesc(String),
}

/// List query: conditions are AND-ed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Order,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Count-only query: matches nothing back, still reports `total`
    pub fn count_only(self) -> Self {
        self.limit(0)
    }
}

/// Page of documents with the total number of matches
#[derive(Debug, Clone, Default)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub total: u64,
}

impl DocumentList {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        self.documents.iter().map(Document::decode).collect()
    }
}

/// Operations every document store backend provides.
///
/// Every call is a single attempt; failures propagate unmodified.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, generating an id when none is given
    async fn create(
        &self,
        collection: Collection,
        id: Option<String>,
        data: Data,
    ) -> Result<Document, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merge `patch` into the document's attributes
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Data,
    ) -> Result<Document, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    async fn list(&self, collection: Collection, query: &Query) -> Result<DocumentList, StoreError>;

    /// Atomically add `by` to an integer attribute, returning the new value
    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<i64, StoreError>;
}

/// Generate a document id
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
