//! Resource entity model.
//!
//! A resource is a protectable object. Every resource is owned by a
//! role; ownership implies full control over the resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A resource in the access-control fact base.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Resource {
    /// Qualified resource identifier, e.g. `rspec:variable:db/password`.
    pub resource_id: String,

    /// Role that owns this resource.
    pub owner_id: String,

    /// Policy load that owns this row; `None` for bootstrap rows.
    pub policy_id: Option<String>,

    /// When the resource was created.
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// Insert a resource row.
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
        owner_id: &str,
        policy_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO resources (resource_id, owner_id, policy_id)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(resource_id)
        .bind(owner_id)
        .bind(policy_id)
        .fetch_one(executor)
        .await
    }

    /// Find a resource by its qualified identifier.
    pub async fn find_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM resources WHERE resource_id = $1
            ",
        )
        .bind(resource_id)
        .fetch_optional(executor)
        .await
    }

    /// Check whether a resource exists.
    pub async fn exists(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r"
            SELECT EXISTS (SELECT 1 FROM resources WHERE resource_id = $1)
            ",
        )
        .bind(resource_id)
        .fetch_one(executor)
        .await
    }

    /// List all resources owned by a policy, ordered by identifier.
    pub async fn list_by_policy(
        executor: impl sqlx::PgExecutor<'_>,
        policy_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM resources WHERE policy_id = $1 ORDER BY resource_id
            ",
        )
        .bind(policy_id)
        .fetch_all(executor)
        .await
    }
}
