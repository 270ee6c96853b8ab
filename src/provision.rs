//! Store provisioning
//!
//! Creates and drops the tables and indexes both PostgreSQL backends rely
//! on. The DDL is generated from [`crate::store::schema`].

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::{is_identifier, ProvisionConfig};
use crate::store::schema::{self, CollectionSchema, Index, IndexKind};
use crate::store::Collection;

/// Provisioning errors
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    UnknownCollection(String),

    #[error("Invalid attribute name: {0:?}")]
    InvalidAttribute(String),

    #[error("Invalid schema name: {0:?}")]
    InvalidSchema(String),
}

// =========================================================================
// DDL generation
// =========================================================================

fn index_name(index: &Index) -> String {
    format!("idx_{}", index.key)
}

fn index_expression(index: &Index) -> String {
    index
        .attributes
        .iter()
        .map(|attribute| format!("(data ->> '{}')", attribute))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One partial expression index over the collection's documents
pub fn index_statement(db_schema: &str, collection: &CollectionSchema, index: &Index) -> String {
    let name = index_name(index);
    let scope = collection.collection.as_str();
    match index.kind {
        IndexKind::Key => format!(
            "CREATE INDEX IF NOT EXISTS {name} ON {db_schema}.documents ({expr}) WHERE collection = '{scope}'",
            expr = index_expression(index),
        ),
        IndexKind::Unique => format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON {db_schema}.documents ({expr}) WHERE collection = '{scope}'",
            expr = index_expression(index),
        ),
        IndexKind::Fulltext => {
            let document = index
                .attributes
                .iter()
                .map(|attribute| format!("coalesce(data ->> '{}', '')", attribute))
                .collect::<Vec<_>>()
                .join(" || ' ' || ");
            format!(
                "CREATE INDEX IF NOT EXISTS {name} ON {db_schema}.documents USING GIN (to_tsvector('simple', {document})) WHERE collection = '{scope}'"
            )
        }
    }
}

/// Everything `setup` runs, in order
pub fn setup_statements(db_schema: &str) -> Vec<String> {
    let mut statements = vec![
        format!("CREATE SCHEMA IF NOT EXISTS {db_schema}"),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {db_schema}.documents (
                seq BIGSERIAL NOT NULL,
                id TEXT NOT NULL,
                collection TEXT NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )"#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_documents_created ON {db_schema}.documents (collection, created_at DESC)"
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {db_schema}.identities (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {db_schema}.sessions (
                token_hash TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL REFERENCES {db_schema}.identities (id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ NOT NULL
            )"#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON {db_schema}.sessions (expires_at)"),
    ];

    for collection in schema::ALL.iter() {
        for index in collection.indexes {
            statements.push(index_statement(db_schema, collection, index));
        }
    }
    statements
}

/// Everything `reset` runs
pub fn reset_statements(db_schema: &str) -> Vec<String> {
    vec![
        format!("DROP TABLE IF EXISTS {db_schema}.sessions"),
        format!("DROP TABLE IF EXISTS {db_schema}.identities"),
        format!("DROP TABLE IF EXISTS {db_schema}.documents"),
    ]
}

/// Indexes of `collection` that read `attribute`
pub fn indexes_using<'a>(collection: &'a CollectionSchema, attribute: &'a str) -> impl Iterator<Item = &'a Index> {
    collection
        .indexes
        .iter()
        .filter(move |index| index.attributes.contains(&attribute))
}

// =========================================================================
// Provisioner
// =========================================================================

/// Runs provisioning commands against one database schema
pub struct Provisioner {
    pool: PgPool,
    db_schema: String,
}

impl Provisioner {
    pub fn new(pool: PgPool, db_schema: impl Into<String>) -> Result<Self, ProvisionError> {
        let db_schema = db_schema.into();
        if !is_identifier(&db_schema) {
            return Err(ProvisionError::InvalidSchema(db_schema));
        }
        Ok(Self { pool, db_schema })
    }

    /// Connect with the store credentials
    pub async fn connect(config: &ProvisionConfig) -> Result<Self, ProvisionError> {
        let options = PgConnectOptions::from_str(&config.endpoint)?
            .password(&config.api_key)
            .application_name(&config.project_id);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::new(pool, config.database_id.clone())
    }

    async fn run(&self, statements: Vec<String>) -> Result<(), ProvisionError> {
        let mut tx = self.pool.begin().await?;
        for statement in &statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn setup(&self) -> Result<(), ProvisionError> {
        let statements = setup_statements(&self.db_schema);
        let count = statements.len();
        self.run(statements).await?;
        tracing::info!(schema = %self.db_schema, statements = count, "Store provisioned");
        Ok(())
    }

    pub async fn reset(&self) -> Result<(), ProvisionError> {
        self.run(reset_statements(&self.db_schema)).await?;
        tracing::info!(schema = %self.db_schema, "Store tables dropped");
        Ok(())
    }

    /// Strip `attribute` from every document of `collection` and drop the
    /// indexes that read it. Returns the number of documents changed.
    pub async fn delete_attribute(&self, collection: &str, attribute: &str) -> Result<u64, ProvisionError> {
        let collection = Collection::from_str(collection).map_err(ProvisionError::UnknownCollection)?;
        if attribute.is_empty() || attribute.starts_with('$') {
            return Err(ProvisionError::InvalidAttribute(attribute.to_string()));
        }
        let collection_schema = schema::for_collection(collection);
        if collection_schema.attribute(attribute).is_none() {
            tracing::warn!(collection = %collection, attribute = %attribute, "Attribute is not declared in the schema");
        }

        let mut tx = self.pool.begin().await?;
        for index in indexes_using(collection_schema, attribute) {
            let statement = format!("DROP INDEX IF EXISTS {}.{}", self.db_schema, index_name(index));
            sqlx::query(&statement).execute(&mut *tx).await?;
            tracing::info!(index = %index.key, "Dropped index");
        }

        let statement = format!(
            "UPDATE {}.documents SET data = data - $1, updated_at = NOW() WHERE collection = $2 AND data ? $1",
            self.db_schema
        );
        let changed = sqlx::query(&statement)
            .bind(attribute)
            .bind(collection.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        tracing::info!(collection = %collection, attribute = %attribute, documents = changed, "Attribute deleted");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_creates_tables_then_indexes() {
        let statements = setup_statements("eventcity");

        assert!(statements[0].starts_with("CREATE SCHEMA IF NOT EXISTS eventcity"));
        assert!(statements[1].contains("eventcity.documents"));
        let index_count: usize = schema::ALL.iter().map(|c| c.indexes.len()).sum();
        assert_eq!(statements.len(), 6 + index_count);
    }

    #[test]
    fn test_unique_index_is_partial_per_collection() {
        let index = &schema::FAVORITES.indexes[0];
        let sql = index_statement("eventcity", &schema::FAVORITES, index);

        assert!(sql.starts_with("CREATE UNIQUE INDEX IF NOT EXISTS idx_favorites_event_user"));
        assert!(sql.contains("(data ->> 'event'), (data ->> 'user')"));
        assert!(sql.ends_with("WHERE collection = 'favorites'"));
    }

    #[test]
    fn test_fulltext_index() {
        let index = schema::EVENTS
            .indexes
            .iter()
            .find(|i| i.kind == IndexKind::Fulltext)
            .unwrap();
        let sql = index_statement("eventcity", &schema::EVENTS, index);
        assert!(sql.contains("USING GIN (to_tsvector('simple', coalesce(data ->> 'title', '')))"));
    }

    #[test]
    fn test_reset_drops_dependents_first() {
        let statements = reset_statements("eventcity");
        assert_eq!(statements[0], "DROP TABLE IF EXISTS eventcity.sessions");
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn test_indexes_using_attribute() {
        let names: Vec<_> = indexes_using(&schema::REGISTRATIONS, "user").map(|i| i.key).collect();
        assert_eq!(names, vec!["registrations_event_user", "registrations_user"]);
        assert_eq!(indexes_using(&schema::REGISTRATIONS, "registeredAt").count(), 0);
    }
}
