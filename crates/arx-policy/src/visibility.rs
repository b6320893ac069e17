//! Row visibility under a permission snapshot.
//!
//! The dry-run reporter only shows a caller rows it could see: a
//! resource is visible if the caller's transitive role closure owns it
//! or holds any privilege on it; a role is visible if it is in the
//! closure. Both queries are schema-parametrized so the same shapes
//! evaluate against the pre-load snapshot and the post-load state.

use std::collections::HashSet;

use serde_json::Value as JsonValue;
use sqlx::PgConnection;

use crate::error::{classify_sqlx, Result};
use crate::schema::TableSpec;

/// The ids a role could see under one permission snapshot.
#[derive(Debug, Clone, Default)]
pub struct VisibilitySnapshot {
    /// Visible role ids.
    pub roles: HashSet<String>,

    /// Visible resource ids.
    pub resources: HashSet<String>,
}

impl VisibilitySnapshot {
    /// Whether a diff row of `table` is visible.
    ///
    /// Rows are keyed by their leading identifier: role-side relations
    /// by `role_id`, resource-side relations by `resource_id`.
    /// Credentials are never visible in diff output.
    #[must_use]
    pub fn allows(&self, table: &TableSpec, row: &JsonValue) -> bool {
        if !table.diffable {
            return false;
        }
        let key = table.primary_key[0];
        let Some(id) = row.get(key).and_then(JsonValue::as_str) else {
            return false;
        };
        match key {
            "role_id" => self.roles.contains(id),
            _ => self.resources.contains(id),
        }
    }
}

/// SQL for the caller's transitive role closure in `schema`.
pub(crate) fn closure_cte(schema: &str) -> String {
    format!(
        "WITH RECURSIVE closure AS ( \
         SELECT $1::text AS role_id \
         UNION \
         SELECT rm.role_id FROM {schema}.role_memberships rm \
         JOIN closure c ON rm.member_id = c.role_id \
         )"
    )
}

/// Compute what `actor_role_id` can see in `schema`.
pub async fn snapshot(
    conn: &mut PgConnection,
    schema: &str,
    actor_role_id: &str,
) -> Result<VisibilitySnapshot> {
    let roles: Vec<String> = sqlx::query_scalar(&format!(
        "{cte} SELECT role_id FROM closure",
        cte = closure_cte(schema)
    ))
    .bind(actor_role_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(classify_sqlx)?;

    let resources: Vec<String> = sqlx::query_scalar(&format!(
        "{cte} \
         SELECT DISTINCT r.resource_id FROM {schema}.resources r \
         WHERE r.owner_id IN (SELECT role_id FROM closure) \
         OR EXISTS ( \
         SELECT 1 FROM {schema}.permissions p \
         WHERE p.resource_id = r.resource_id \
         AND p.role_id IN (SELECT role_id FROM closure))",
        cte = closure_cte(schema),
    ))
    .bind(actor_role_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(classify_sqlx)?;

    Ok(VisibilitySnapshot {
        roles: roles.into_iter().collect(),
        resources: resources.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CREDENTIALS, RESOURCES, ROLES};
    use serde_json::json;

    #[test]
    fn test_closure_cte_is_schema_qualified() {
        let sql = closure_cte("policy_dryrun_ab");
        assert!(sql.contains("policy_dryrun_ab.role_memberships"));
        assert!(sql.starts_with("WITH RECURSIVE closure AS ("));
    }

    #[test]
    fn test_allows_keys_roles_and_resources_separately() {
        let mut snapshot = VisibilitySnapshot::default();
        snapshot.roles.insert("rspec:user:alice".to_string());
        snapshot
            .resources
            .insert("rspec:variable:db/password".to_string());

        assert!(snapshot.allows(&ROLES, &json!({"role_id": "rspec:user:alice"})));
        assert!(!snapshot.allows(&ROLES, &json!({"role_id": "rspec:user:bob"})));
        assert!(snapshot.allows(
            &RESOURCES,
            &json!({"resource_id": "rspec:variable:db/password"})
        ));
        assert!(!snapshot.allows(
            &RESOURCES,
            &json!({"resource_id": "rspec:variable:other"})
        ));
    }

    #[test]
    fn test_credentials_are_never_visible() {
        let mut snapshot = VisibilitySnapshot::default();
        snapshot.roles.insert("rspec:user:alice".to_string());
        assert!(!snapshot.allows(&CREDENTIALS, &json!({"role_id": "rspec:user:alice"})));
    }
}
