//! Role entity model.
//!
//! A role is an identity or group that can hold permissions. Roles form
//! the subject side of every grant in the access-control fact base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A role in the access-control fact base.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    /// Qualified role identifier, e.g. `rspec:user:alice`.
    pub role_id: String,

    /// Policy load that owns this row; `None` for bootstrap rows.
    pub policy_id: Option<String>,

    /// When the role was created.
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Insert a role row.
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
        policy_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO roles (role_id, policy_id)
            VALUES ($1, $2)
            RETURNING *
            ",
        )
        .bind(role_id)
        .bind(policy_id)
        .fetch_one(executor)
        .await
    }

    /// Find a role by its qualified identifier.
    pub async fn find_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM roles WHERE role_id = $1
            ",
        )
        .bind(role_id)
        .fetch_optional(executor)
        .await
    }

    /// Check whether a role exists.
    pub async fn exists(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r"
            SELECT EXISTS (SELECT 1 FROM roles WHERE role_id = $1)
            ",
        )
        .bind(role_id)
        .fetch_one(executor)
        .await
    }

    /// List all roles owned by a policy, ordered by identifier.
    pub async fn list_by_policy(
        executor: impl sqlx::PgExecutor<'_>,
        policy_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM roles WHERE policy_id = $1 ORDER BY role_id
            ",
        )
        .bind(policy_id)
        .fetch_all(executor)
        .await
    }
}
