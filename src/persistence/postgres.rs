//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::domain::{Connection, Subscription};
use crate::error::GatewayError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool from the configured database settings and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// Records a new connection row.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_connection(&self, connection: &Connection) -> Result<(), GatewayError> {
        sqlx::query("INSERT INTO connections (channel, user_ref, created_at) VALUES ($1, $2, $3)")
            .bind(*connection.channel.as_uuid())
            .bind(connection.user.as_ref().map(|u| u.as_str().to_string()))
            .bind(connection.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Deletes a connection row; its subscriptions go with it.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn delete_connection(&self, channel: Uuid) -> Result<u64, GatewayError> {
        let result = sqlx::query("DELETE FROM connections WHERE channel = $1")
            .bind(channel)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Records a new subscription row.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_subscription(&self, sub: &Subscription) -> Result<(), GatewayError> {
        let id = i64::try_from(sub.id.get())
            .map_err(|_| GatewayError::Internal(format!("subscription id {} overflows", sub.id)))?;
        sqlx::query(
            "INSERT INTO subscriptions (id, channel, publication, parent, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(*sub.channel.as_uuid())
        .bind(&sub.publication)
        .bind(&sub.parent)
        .bind(sub.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Deletes subscription rows by id.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn delete_subscriptions(&self, ids: &[i64]) -> Result<u64, GatewayError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Deletes every connection row, cascading to subscriptions.
    ///
    /// Called once at startup: rows surviving an unclean shutdown refer to
    /// sessions that no longer exist.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn reap_stale_connections(&self) -> Result<u64, GatewayError> {
        let result = sqlx::query("DELETE FROM connections")
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
