//! Policy log model.
//!
//! Read side of the append-only audit trail. Entries are written in
//! bulk by the reconciliation engine; this model only queries them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// One row-level change caused by a policy load.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PolicyLogEntry {
    /// Policy scope the load applied to.
    pub policy_id: String,

    /// Version of the load that caused the change.
    pub version: i32,

    /// `INSERT`, `UPDATE`, or `DELETE`.
    pub operation: String,

    /// Affected relation, e.g. `roles`.
    pub kind: String,

    /// Primary-key map of the affected row.
    pub subject: JsonValue,

    /// Full snapshot of the affected row.
    pub data: JsonValue,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl PolicyLogEntry {
    /// List all entries for one version of a policy, in write order.
    pub async fn list_for_version(
        executor: impl sqlx::PgExecutor<'_>,
        policy_id: &str,
        version: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM policy_log
            WHERE policy_id = $1 AND version = $2
            ORDER BY created_at, kind, operation
            ",
        )
        .bind(policy_id)
        .bind(version)
        .fetch_all(executor)
        .await
    }

    /// List every entry ever written for a policy scope.
    pub async fn list_for_policy(
        executor: impl sqlx::PgExecutor<'_>,
        policy_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM policy_log
            WHERE policy_id = $1
            ORDER BY version, created_at, kind
            ",
        )
        .bind(policy_id)
        .fetch_all(executor)
        .await
    }
}
