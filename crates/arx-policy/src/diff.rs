//! Set-difference queries over two schema-qualified copies of the
//! access-control relations.
//!
//! Pure and reusable: the merge phases use these shapes for duplicate
//! and shadow elimination, and the dry-run reporter uses them to build
//! its before/after delta. Rows come back as plain JSON attribute maps
//! (`to_jsonb`), restricted to the compared columns, ordered by primary
//! key for deterministic output.

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;
use sqlx::PgConnection;

use crate::error::{classify_sqlx, Result};
use crate::schema::{TableSpec, TABLES};

/// Schema-parametrized set differences over the six relations.
pub struct DiffEngine;

impl DiffEngine {
    /// SQL for rows present in `schema_b` but absent from `schema_a`,
    /// compared on all non-excluded columns.
    #[must_use]
    pub fn unique_to_sql(schema_a: &str, schema_b: &str, table: &TableSpec) -> String {
        format!(
            "SELECT to_jsonb(u) FROM ( \
             SELECT {cols} FROM {b} b \
             WHERE NOT EXISTS (SELECT 1 FROM {a} a WHERE {row_match}) \
             ) u ORDER BY {order}",
            cols = table.column_list(),
            b = table.qualified(schema_b),
            a = table.qualified(schema_a),
            row_match = table.row_match("a", "b"),
            order = table.order_by("u"),
        )
    }

    /// Rows present in `schema_b` but absent from `schema_a`.
    pub async fn unique_to(
        conn: &mut PgConnection,
        schema_a: &str,
        schema_b: &str,
        table: &TableSpec,
    ) -> Result<Vec<JsonValue>> {
        sqlx::query_scalar(&Self::unique_to_sql(schema_a, schema_b, table))
            .fetch_all(conn)
            .await
            .map_err(classify_sqlx)
    }

    /// Identifying ids touched by any row unique to either side, for
    /// every relation, unioned into one set representing "anything
    /// modified".
    pub async fn changed_entity_ids(
        conn: &mut PgConnection,
        schema_a: &str,
        schema_b: &str,
    ) -> Result<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for table in TABLES {
            for (left, right) in [(schema_a, schema_b), (schema_b, schema_a)] {
                let rows = Self::unique_to(&mut *conn, left, right, table).await?;
                for row in &rows {
                    for column in table.entity_ids {
                        if let Some(id) = row.get(*column).and_then(JsonValue::as_str) {
                            ids.insert(id.to_string());
                        }
                    }
                }
            }
        }
        Ok(ids)
    }

    /// SQL for the distinct rows of a relation whose identifying
    /// columns match any of a given id set.
    #[must_use]
    pub fn original_state_sql(schema: &str, table: &TableSpec) -> String {
        let id_match = table
            .entity_ids
            .iter()
            .map(|c| format!("u.{c} = ANY($1)"))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "SELECT DISTINCT ON ({order}) to_jsonb(u) FROM ( \
             SELECT {cols} FROM {t} \
             ) u WHERE {id_match} ORDER BY {order}",
            cols = table.column_list(),
            t = table.qualified(schema),
            order = table.order_by("u"),
        )
    }

    /// Rows of `table` in `schema` touching any id in `ids`. Recovers a
    /// row's value around a change even when the row itself did not
    /// change (e.g. a resource whose annotation changed).
    pub async fn original_state(
        conn: &mut PgConnection,
        schema: &str,
        ids: &[String],
        table: &TableSpec,
    ) -> Result<Vec<JsonValue>> {
        sqlx::query_scalar(&Self::original_state_sql(schema, table))
            .bind(ids)
            .fetch_all(conn)
            .await
            .map_err(classify_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ANNOTATIONS, ROLES};

    #[test]
    fn test_unique_to_sql_compares_all_columns_and_orders_by_pk() {
        let sql = DiffEngine::unique_to_sql("before", "public", &ROLES);
        assert_eq!(
            sql,
            "SELECT to_jsonb(u) FROM ( \
             SELECT role_id, policy_id FROM public.roles b \
             WHERE NOT EXISTS (SELECT 1 FROM before.roles a \
             WHERE a.role_id IS NOT DISTINCT FROM b.role_id \
             AND a.policy_id IS NOT DISTINCT FROM b.policy_id) \
             ) u ORDER BY u.role_id"
        );
    }

    #[test]
    fn test_original_state_sql_matches_any_entity_column() {
        let sql = DiffEngine::original_state_sql("public", &ANNOTATIONS);
        assert!(sql.contains("u.resource_id = ANY($1)"));
        assert!(sql.contains("ORDER BY u.resource_id, u.name"));
        assert!(!sql.contains("created_at"));
    }
}
