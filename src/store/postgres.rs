//! PostgreSQL document store
//!
//! Documents live in one `documents` table as JSONB, partitioned logically
//! by the `collection` column. Unique indexes are partial expression
//! indexes created by the provisioning CLI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::schema;
use super::{unique_id, Bound, Collection, Data, Document, DocumentList, DocumentStore, Filter, Order, Query, StoreError};

type DocumentRow = (String, serde_json::Value, DateTime<Utc>, DateTime<Utc>);

/// Document store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn into_document(collection: Collection, row: DocumentRow) -> Result<Document, StoreError> {
    let (id, data, created_at, updated_at) = row;
    let data = match data {
        serde_json::Value::Object(map) => map,
        _ => return Err(StoreError::invalid(collection, format!("document '{}' is not an object", id))),
    };
    Ok(Document {
        id,
        collection,
        data,
        created_at,
        updated_at,
    })
}

/// Map unique violations to conflicts, everything else to database errors
fn map_write_error(collection: Collection, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or("unique index").to_string();
            return StoreError::conflict(collection, format!("'{}' violated", constraint));
        }
    }
    StoreError::Database(err)
}

/// Escape LIKE metacharacters and wrap in wildcards
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, collection: Collection, filters: &[Filter]) {
    qb.push(" WHERE collection = ");
    qb.push_bind(collection.as_str());

    for filter in filters {
        match filter {
            Filter::Equal(field, value) => {
                qb.push(" AND data -> ");
                qb.push_bind(field.clone());
                qb.push(" = ");
                qb.push_bind(value.clone());
            }
            Filter::Search(field, text) => {
                for term in text.split_whitespace() {
                    qb.push(" AND data ->> ");
                    qb.push_bind(field.clone());
                    qb.push(" ILIKE ");
                    qb.push_bind(like_pattern(term));
                }
            }
            Filter::Contains(field, text) => {
                qb.push(" AND data ->> ");
                qb.push_bind(field.clone());
                qb.push(" ILIKE ");
                qb.push_bind(like_pattern(text));
            }
            Filter::GreaterThanEqual(field, bound) => push_range(qb, field, ">=", bound),
            Filter::LessThanEqual(field, bound) => push_range(qb, field, "<=", bound),
        }
    }
}

fn push_range(qb: &mut QueryBuilder<'_, Postgres>, field: &str, op: &str, bound: &Bound) {
    match bound {
        Bound::Date(date) => {
            qb.push(" AND (data ->> ");
            qb.push_bind(field.to_string());
            qb.push(")::timestamptz ");
            qb.push(op);
            qb.push(" ");
            qb.push_bind(*date);
        }
        Bound::Int(n) => {
            qb.push(" AND (data ->> ");
            qb.push_bind(field.to_string());
            qb.push(")::bigint ");
            qb.push(op);
            qb.push(" ");
            qb.push_bind(*n);
        }
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Postgres>, order: &Order) {
    match order {
        Order::CreatedDesc => {
            qb.push(" ORDER BY created_at DESC, seq DESC");
        }
        Order::CreatedAsc => {
            qb.push(" ORDER BY created_at ASC, seq ASC");
        }
        Order::FieldAsc(field) => {
            qb.push(" ORDER BY data -> ");
            qb.push_bind(field.clone());
            qb.push(" ASC NULLS FIRST, created_at DESC");
        }
        Order::FieldDesc(field) => {
            qb.push(" ORDER BY data -> ");
            qb.push_bind(field.clone());
            qb.push(" DESC NULLS LAST, created_at DESC");
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(
        &self,
        collection: Collection,
        id: Option<String>,
        mut data: Data,
    ) -> Result<Document, StoreError> {
        let schema = schema::for_collection(collection);
        schema.apply_defaults(&mut data);
        schema.validate(&data)?;

        let id = id.unwrap_or_else(unique_id);
        let row: DocumentRow = sqlx::query_as(
            r#"
            INSERT INTO documents (id, collection, data, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, data, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(collection.as_str())
        .bind(serde_json::Value::Object(data))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, e))?;

        into_document(collection, row)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| into_document(collection, r)).transpose()
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Data,
    ) -> Result<Document, StoreError> {
        schema::for_collection(collection).validate_values(&patch)?;

        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            UPDATE documents
            SET data = data || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING id, data, created_at, updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(serde_json::Value::Object(patch))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, e))?;

        let row = row.ok_or_else(|| StoreError::not_found(collection, id))?;
        into_document(collection, row)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let rows = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    async fn list(&self, collection: Collection, query: &Query) -> Result<DocumentList, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents");
        push_conditions(&mut count, collection, &query.filters);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        if query.limit == Some(0) || total == 0 {
            return Ok(DocumentList {
                documents: Vec::new(),
                total: total as u64,
            });
        }

        let mut select =
            QueryBuilder::<Postgres>::new("SELECT id, data, created_at, updated_at FROM documents");
        push_conditions(&mut select, collection, &query.filters);
        push_order(&mut select, &query.order);
        if let Some(limit) = query.limit {
            select.push(" LIMIT ");
            select.push_bind(limit as i64);
        }
        select.push(" OFFSET ");
        select.push_bind(query.offset as i64);

        let rows: Vec<DocumentRow> = select.build_query_as::<DocumentRow>().fetch_all(&self.pool).await?;
        let documents = rows
            .into_iter()
            .map(|r| into_document(collection, r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentList {
            documents,
            total: total as u64,
        })
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<i64, StoreError> {
        let value: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET data = jsonb_set(
                    data,
                    ARRAY[$3::text],
                    to_jsonb(COALESCE((data ->> $3)::bigint, 0) + $4)
                ),
                updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING (data ->> $3)::bigint
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(field)
        .bind(by)
        .fetch_optional(&self.pool)
        .await?;

        value.ok_or_else(|| StoreError::not_found(collection, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("park"), "%park%");
    }

    #[test]
    fn test_conditions_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents");
        let filters = vec![
            Filter::equal("status", "PUBLISHED"),
            Filter::search("title", "jazz night"),
        ];
        push_conditions(&mut qb, Collection::Events, &filters);

        let sql = qb.sql();
        assert!(sql.contains("WHERE collection = $1"));
        assert!(sql.contains("AND data -> $2 = $3"));
        // One ILIKE per search term
        assert_eq!(sql.matches("ILIKE").count(), 2);
    }
}
