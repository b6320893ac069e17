//! Batched policy-log writing.
//!
//! Every row-level change a load commits gets one append-only
//! `policy_log` entry carrying the policy scope, version, operation,
//! relation, primary-key map, and full row snapshot. Entries are
//! written set-based — `INSERT ... SELECT` over the affected rows, or a
//! CTE capturing a `DELETE`/`UPDATE`'s `RETURNING` set — rather than by
//! a per-row trigger, so bulk phases stay bulk.
//!
//! Bind convention for every statement built here: `$1` is the policy
//! id, `$2` the version; predicate-specific binds start at `$3`.

use crate::schema::{TableSpec, LIVE_SCHEMA};

/// Log one `INSERT` entry per staged row of `table`.
///
/// Run after the bulk copy into the live relation: the staged rows are
/// exactly what was inserted, so this replays the equivalent of per-row
/// logging in one statement.
#[must_use]
pub(crate) fn staged_insert_log_sql(staging_schema: &str, table: &TableSpec) -> String {
    format!(
        "INSERT INTO {live}.policy_log (policy_id, version, operation, kind, subject, data) \
         SELECT $1, $2, 'INSERT', '{kind}', {subject}, to_jsonb(u) \
         FROM (SELECT {cols} FROM {staged}) u",
        live = LIVE_SCHEMA,
        kind = table.name,
        subject = table.subject_json("u"),
        cols = table.column_list(),
        staged = table.qualified(staging_schema),
    )
}

/// Delete live rows of `table` matching `predicate` (over alias `l`)
/// and log one `DELETE` entry per removed row.
#[must_use]
pub(crate) fn delete_with_log_sql(table: &TableSpec, predicate: &str) -> String {
    let returning = table
        .compared
        .iter()
        .map(|c| format!("l.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "WITH deleted AS ( \
         DELETE FROM {live_table} l WHERE {predicate} RETURNING {returning} \
         ) \
         INSERT INTO {live}.policy_log (policy_id, version, operation, kind, subject, data) \
         SELECT $1, $2, 'DELETE', '{kind}', {subject}, to_jsonb(d) FROM deleted d",
        live_table = table.qualified(LIVE_SCHEMA),
        live = LIVE_SCHEMA,
        kind = table.name,
        subject = table.subject_json("d"),
    )
}

/// Update live rows of `table` in place from their staged counterparts
/// where any non-key column differs, and log one `UPDATE` entry per
/// changed row with its post-update content.
#[must_use]
pub(crate) fn update_with_log_sql(staging_schema: &str, table: &TableSpec) -> String {
    let returning = table
        .compared
        .iter()
        .map(|c| format!("l.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "WITH updated AS ( \
         UPDATE {live_table} l SET {set_clause} FROM {staged} s \
         WHERE {pk_match} AND ({differs}) RETURNING {returning} \
         ) \
         INSERT INTO {live}.policy_log (policy_id, version, operation, kind, subject, data) \
         SELECT $1, $2, 'UPDATE', '{kind}', {subject}, to_jsonb(u) FROM updated u",
        live_table = table.qualified(LIVE_SCHEMA),
        staged = table.qualified(staging_schema),
        set_clause = table.update_set_clause("s"),
        pk_match = table.pk_match("l", "s"),
        differs = table.any_column_differs("l", "s"),
        live = LIVE_SCHEMA,
        kind = table.name,
        subject = table.subject_json("u"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ANNOTATIONS, ROLES};

    #[test]
    fn test_staged_insert_log_sql() {
        let sql = staged_insert_log_sql("policy_loader_ab", &ROLES);
        assert_eq!(
            sql,
            "INSERT INTO public.policy_log (policy_id, version, operation, kind, subject, data) \
             SELECT $1, $2, 'INSERT', 'roles', jsonb_build_object('role_id', u.role_id), \
             to_jsonb(u) FROM (SELECT role_id, policy_id FROM policy_loader_ab.roles) u"
        );
    }

    #[test]
    fn test_delete_with_log_wraps_predicate_in_cte() {
        let sql = delete_with_log_sql(&ROLES, "l.role_id = $3");
        assert!(sql.starts_with("WITH deleted AS ( DELETE FROM public.roles l WHERE l.role_id = $3"));
        assert!(sql.contains("RETURNING l.role_id, l.policy_id"));
        assert!(sql.contains("'DELETE', 'roles'"));
        assert!(sql.ends_with("FROM deleted d"));
    }

    #[test]
    fn test_update_with_log_only_touches_changed_rows() {
        let sql = update_with_log_sql("policy_loader_ab", &ANNOTATIONS);
        assert!(sql.contains("SET value = s.value, policy_id = s.policy_id"));
        assert!(sql.contains("l.resource_id = s.resource_id AND l.name = s.name"));
        assert!(sql.contains(
            "(l.value IS DISTINCT FROM s.value OR l.policy_id IS DISTINCT FROM s.policy_id)"
        ));
        assert!(sql.contains("'UPDATE', 'annotations'"));
    }
}
