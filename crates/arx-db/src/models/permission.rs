//! Permission entity model.
//!
//! A grant of a privilege on a resource to a role.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A privilege grant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Permission {
    /// The protected resource.
    pub resource_id: String,

    /// The granted privilege, e.g. `read`, `execute`, `update`.
    pub privilege: String,

    /// The role holding the grant.
    pub role_id: String,

    /// Policy load that owns this row; `None` for bootstrap rows.
    pub policy_id: Option<String>,
}

impl Permission {
    /// Insert a permission row.
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
        privilege: &str,
        role_id: &str,
        policy_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO permissions (resource_id, privilege, role_id, policy_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(resource_id)
        .bind(privilege)
        .bind(role_id)
        .bind(policy_id)
        .fetch_one(executor)
        .await
    }

    /// Check whether a direct grant exists.
    pub async fn exists(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
        privilege: &str,
        role_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM permissions
                WHERE resource_id = $1 AND privilege = $2 AND role_id = $3
            )
            ",
        )
        .bind(resource_id)
        .bind(privilege)
        .bind(role_id)
        .fetch_one(executor)
        .await
    }

    /// List all grants on a resource, ordered by privilege then role.
    pub async fn list_for_resource(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM permissions
            WHERE resource_id = $1
            ORDER BY privilege, role_id
            ",
        )
        .bind(resource_id)
        .fetch_all(executor)
        .await
    }
}
