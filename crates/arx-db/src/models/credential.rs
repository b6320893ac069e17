//! Credential entity model.
//!
//! Secret material associated with a role. The `api_key` column is
//! secret: it is never compared by the diff engine, never copied into
//! dry-run snapshots, and never serialized.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Secret material for a role.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Credential {
    /// The role these credentials belong to.
    pub role_id: String,

    /// OAuth-style client identifier, if any.
    pub client_id: Option<String>,

    /// API key material. Never leaves the database layer.
    #[serde(skip_serializing, default)]
    pub api_key: Option<Vec<u8>>,

    /// CIDR ranges the role may authenticate from; empty means unrestricted.
    pub restricted_to: Vec<String>,
}

impl Credential {
    /// Insert a credential row.
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
        client_id: Option<&str>,
        api_key: Option<&[u8]>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO credentials (role_id, client_id, api_key)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(role_id)
        .bind(client_id)
        .bind(api_key)
        .fetch_one(executor)
        .await
    }

    /// Find credentials by role.
    pub async fn find_by_role(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM credentials WHERE role_id = $1
            ",
        )
        .bind(role_id)
        .fetch_optional(executor)
        .await
    }

    /// Replace the CIDR restriction list for a role, creating the
    /// credential row if it does not exist yet.
    pub async fn set_restricted_to(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
        restricted_to: &[String],
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO credentials (role_id, restricted_to)
            VALUES ($1, $2)
            ON CONFLICT (role_id) DO UPDATE SET restricted_to = EXCLUDED.restricted_to
            RETURNING *
            ",
        )
        .bind(role_id)
        .bind(restricted_to)
        .fetch_one(executor)
        .await
    }
}
