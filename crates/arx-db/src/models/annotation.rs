//! Annotation entity model.
//!
//! Free-form metadata on a resource, keyed by name. Names under the
//! `arx/` prefix are reserved for type metadata injected by the loader.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named annotation on a resource.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Annotation {
    /// The annotated resource.
    pub resource_id: String,

    /// Annotation name.
    pub name: String,

    /// Annotation value.
    pub value: String,

    /// Policy load that owns this row; `None` for bootstrap rows.
    pub policy_id: Option<String>,
}

impl Annotation {
    /// Insert an annotation row.
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
        name: &str,
        value: &str,
        policy_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO annotations (resource_id, name, value, policy_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(resource_id)
        .bind(name)
        .bind(value)
        .bind(policy_id)
        .fetch_one(executor)
        .await
    }

    /// Find an annotation by resource and name.
    pub async fn find(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM annotations WHERE resource_id = $1 AND name = $2
            ",
        )
        .bind(resource_id)
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// List all annotations on a resource, ordered by name.
    pub async fn list_for_resource(
        executor: impl sqlx::PgExecutor<'_>,
        resource_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM annotations WHERE resource_id = $1 ORDER BY name
            ",
        )
        .bind(resource_id)
        .fetch_all(executor)
        .await
    }
}
