//! PostgreSQL identity provider
//!
//! Tables `identities` and `sessions`, created by the provisioning CLI.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use super::password::{hash_password_blocking, new_session_token, token_digest, verify_password_blocking};
use super::{normalize_email, Identity, IdentityError, IdentityProvider, Session};

/// Identity provider backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
    session_ttl: Duration,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool, session_ttl: Duration) -> Self {
        Self { pool, session_ttl }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, IdentityError> {
        let email = normalize_email(email);
        let password_hash = hash_password_blocking(password.to_string()).await?;
        let id = uuid::Uuid::new_v4().simple().to_string();

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO identities (id, email, name, password_hash, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING created_at
            "#,
        )
        .bind(&id)
        .bind(&email)
        .bind(name)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                IdentityError::EmailTaken(email.clone())
            }
            other => IdentityError::Database(other),
        })?;

        Ok(Identity {
            id,
            email,
            name: name.to_string(),
            created_at,
        })
    }

    async fn delete_identity(&self, id: &str) -> Result<(), IdentityError> {
        // Sessions go with the identity (ON DELETE CASCADE)
        let rows = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(IdentityError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email);
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, password_hash FROM identities WHERE email = $1")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await?;

        let (identity_id, password_hash) = row.ok_or(IdentityError::InvalidCredentials)?;
        if !verify_password_blocking(password.to_string(), password_hash).await? {
            return Err(IdentityError::InvalidCredentials);
        }

        let token = new_session_token();
        let expires_at = Utc::now() + self.session_ttl;
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, identity_id, created_at, expires_at)
            VALUES ($1, $2, NOW(), $3)
            "#,
        )
        .bind(token_digest(&token))
        .bind(&identity_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(identity_id = %identity_id, "Session created");

        Ok(Session {
            id: token,
            identity_id,
            email,
            expires_at,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, IdentityError> {
        let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT s.identity_id, i.email, s.expires_at
            FROM sessions s
            JOIN identities i ON i.id = s.identity_id
            WHERE s.token_hash = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token_digest(session_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(identity_id, email, expires_at)| Session {
            id: session_id.to_string(),
            identity_id,
            email,
            expires_at,
        }))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), IdentityError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_digest(session_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired_sessions(&self) -> Result<u64, IdentityError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
