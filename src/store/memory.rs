//! In-memory document store
//!
//! Backend used by tests and local development. Applies the same schema
//! validation and unique-index checks as the PostgreSQL backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::schema::{self, CollectionSchema};
use super::{unique_id, Collection, Data, Document, DocumentList, DocumentStore, Order, Query, StoreError};

/// Document store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<Collection, Vec<Document>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

fn check_unique(
    schema: &CollectionSchema,
    documents: &[Document],
    candidate_id: &str,
    data: &Data,
) -> Result<(), StoreError> {
    for index in schema.unique_indexes() {
        let key: Vec<Option<&Value>> = index.attributes.iter().map(|a| data.get(*a)).collect();
        // Rows with a missing indexed attribute never collide
        if key.iter().any(|v| v.map_or(true, Value::is_null)) {
            continue;
        }

        let taken = documents.iter().any(|doc| {
            doc.id != candidate_id
                && index
                    .attributes
                    .iter()
                    .zip(&key)
                    .all(|(a, v)| doc.data.get(*a) == *v)
        });

        if taken {
            return Err(StoreError::conflict(
                schema.collection,
                format!("unique index '{}' violated", index.key),
            ));
        }
    }
    Ok(())
}

fn sort(documents: &mut [&Document], order: &Order) {
    match order {
        Order::CreatedDesc => {
            // Newest insert first when timestamps tie
            documents.reverse();
            documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Order::CreatedAsc => documents.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        Order::FieldAsc(field) => documents.sort_by(|a, b| cmp_attr(a, b, field)),
        Order::FieldDesc(field) => documents.sort_by(|a, b| cmp_attr(b, a, field)),
    }
}

fn cmp_attr(a: &Document, b: &Document, field: &str) -> std::cmp::Ordering {
    match (a.data.get(field), b.data.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        _ => std::cmp::Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(
        &self,
        collection: Collection,
        id: Option<String>,
        mut data: Data,
    ) -> Result<Document, StoreError> {
        let schema = schema::for_collection(collection);
        schema.apply_defaults(&mut data);
        schema.validate(&data)?;

        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection).or_default();

        let id = id.unwrap_or_else(unique_id);
        if documents.iter().any(|d| d.id == id) {
            return Err(StoreError::conflict(collection, format!("document '{}' already exists", id)));
        }
        check_unique(schema, documents, &id, &data)?;

        let now = Utc::now();
        let document = Document {
            id,
            collection,
            data,
            created_at: now,
            updated_at: now,
        };
        documents.push(document.clone());
        Ok(document)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Data,
    ) -> Result<Document, StoreError> {
        let schema = schema::for_collection(collection);
        schema.validate_values(&patch)?;

        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection).or_default();

        let position = documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        let mut merged = documents[position].data.clone();
        merged.extend(patch);
        check_unique(schema, documents, id, &merged)?;

        let document = &mut documents[position];
        document.data = merged;
        document.updated_at = Utc::now();
        Ok(document.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection).or_default();
        let before = documents.len();
        documents.retain(|d| d.id != id);

        if documents.len() == before {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    async fn list(&self, collection: Collection, query: &Query) -> Result<DocumentList, StoreError> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(&collection) else {
            return Ok(DocumentList::default());
        };

        let mut matched: Vec<&Document> = documents
            .iter()
            .filter(|doc| query.filters.iter().all(|f| f.matches(&doc.data)))
            .collect();
        sort(&mut matched, &query.order);

        let total = matched.len() as u64;
        let documents = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(DocumentList { documents, total })
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<i64, StoreError> {
        let mut collections = self.collections.write().await;
        let document = collections
            .entry(collection)
            .or_default()
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        let value = document.data.get(field).and_then(Value::as_i64).unwrap_or(0) + by;
        document.data.insert(field.to_string(), Value::from(value));
        document.updated_at = Utc::now();
        Ok(value)
    }
}
