//! Database connection pool.
//!
//! Wraps `sqlx::PgPool` behind a small handle so callers never construct
//! pool options by hand, and so configuration is read from the
//! environment in one place.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::DbError;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Pool configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum number of pooled connections.
    pub max_connections: u32,
}

impl DbConfig {
    /// Read configuration from `DATABASE_URL` and `ARX_DB_MAX_CONNECTIONS`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if `DATABASE_URL` is not set.
    pub fn from_env() -> Result<Self, DbError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            DbError::ConnectionFailed(sqlx::Error::Configuration(
                "DATABASE_URL is not set".into(),
            ))
        })?;
        let max_connections = std::env::var("ARX_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

/// Handle to the PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Connect to the database at `url` with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        Self::connect_with(&DbConfig {
            database_url: url.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        })
        .await
    }

    /// Connect using an explicit configuration.
    pub async fn connect_with(config: &DbConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        tracing::info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        Ok(Self { pool })
    }

    /// The underlying `sqlx` pool, for executing queries.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}
