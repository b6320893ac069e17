//! Policy version model.
//!
//! One row per committed policy load. Versions increase monotonically
//! within a policy scope and stamp every policy-log entry the load
//! produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A committed version of a policy scope.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PolicyVersion {
    /// Qualified policy identifier, e.g. `rspec:policy:root`.
    pub policy_id: String,

    /// Monotonically increasing version within the policy scope.
    pub version: i32,

    /// Role that submitted the load.
    pub actor_role_id: String,

    /// When the version was created.
    pub created_at: DateTime<Utc>,
}

impl PolicyVersion {
    /// Allocate the next version for a policy scope.
    ///
    /// Not safe against concurrent loads of the same scope; the engine
    /// relies on the caller to serialize those (see `arx-policy` docs).
    pub async fn create_next(
        executor: impl sqlx::PgExecutor<'_>,
        policy_id: &str,
        actor_role_id: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO policy_versions (policy_id, version, actor_role_id)
            VALUES (
                $1,
                COALESCE((SELECT MAX(version) FROM policy_versions WHERE policy_id = $1), 0) + 1,
                $2
            )
            RETURNING *
            ",
        )
        .bind(policy_id)
        .bind(actor_role_id)
        .fetch_one(executor)
        .await
    }

    /// The latest committed version of a policy scope, if any.
    pub async fn latest(
        executor: impl sqlx::PgExecutor<'_>,
        policy_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM policy_versions
            WHERE policy_id = $1
            ORDER BY version DESC
            LIMIT 1
            ",
        )
        .bind(policy_id)
        .fetch_optional(executor)
        .await
    }
}
