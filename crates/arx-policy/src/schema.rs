//! Descriptors for the six access-control relations.
//!
//! The diff engine and the merge phases are schema-level algorithms:
//! the same SQL shapes apply to every relation, parametrized by table
//! name, primary key, compared columns, and the schema qualifier.
//! [`TableSpec`] captures those parameters once; every generated query
//! takes explicit schema names as input rather than mutating any
//! connection-level search path.
//!
//! Column exclusion policy: `created_at` timestamps are never compared,
//! and credential secret material (`api_key`) is never compared, never
//! snapshotted, and never reported.

/// Schema holding the live relations.
pub const LIVE_SCHEMA: &str = "public";

/// Static description of one access-control relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Relation name.
    pub name: &'static str,

    /// Primary-key columns, identifying columns first.
    pub primary_key: &'static [&'static str],

    /// Columns the diff engine compares. Includes the primary key and
    /// `policy_id` where present; excludes timestamps and secrets.
    pub compared: &'static [&'static str],

    /// Columns whose values feed `changed_entity_ids`.
    pub entity_ids: &'static [&'static str],

    /// Whether rows carry a `policy_id` tag. Tagged relations are the
    /// ones statements stage rows into and replace-mode may delete from.
    pub policy_tagged: bool,

    /// Whether rows of this relation may appear in diff output.
    /// Credentials never do.
    pub diffable: bool,
}

/// `roles(role_id PK, policy_id)`.
pub const ROLES: TableSpec = TableSpec {
    name: "roles",
    primary_key: &["role_id"],
    compared: &["role_id", "policy_id"],
    entity_ids: &["role_id"],
    policy_tagged: true,
    diffable: true,
};

/// `resources(resource_id PK, owner_id, policy_id)`.
pub const RESOURCES: TableSpec = TableSpec {
    name: "resources",
    primary_key: &["resource_id"],
    compared: &["resource_id", "owner_id", "policy_id"],
    entity_ids: &["resource_id"],
    policy_tagged: true,
    diffable: true,
};

/// `role_memberships(role_id, member_id, admin_option, ownership, policy_id)`.
pub const ROLE_MEMBERSHIPS: TableSpec = TableSpec {
    name: "role_memberships",
    primary_key: &["role_id", "member_id"],
    compared: &["role_id", "member_id", "admin_option", "ownership", "policy_id"],
    entity_ids: &["role_id", "member_id"],
    policy_tagged: true,
    diffable: true,
};

/// `permissions(resource_id, privilege, role_id, policy_id)`.
pub const PERMISSIONS: TableSpec = TableSpec {
    name: "permissions",
    primary_key: &["resource_id", "privilege", "role_id"],
    compared: &["resource_id", "privilege", "role_id", "policy_id"],
    entity_ids: &["resource_id", "role_id"],
    policy_tagged: true,
    diffable: true,
};

/// `annotations(resource_id, name, value, policy_id)`.
pub const ANNOTATIONS: TableSpec = TableSpec {
    name: "annotations",
    primary_key: &["resource_id", "name"],
    compared: &["resource_id", "name", "value", "policy_id"],
    entity_ids: &["resource_id"],
    policy_tagged: true,
    diffable: true,
};

/// `credentials(role_id PK, client_id, restricted_to)` — `api_key` is
/// secret and excluded from comparison.
pub const CREDENTIALS: TableSpec = TableSpec {
    name: "credentials",
    primary_key: &["role_id"],
    compared: &["role_id", "client_id", "restricted_to"],
    entity_ids: &["role_id"],
    policy_tagged: false,
    diffable: false,
};

/// All six relations, in dependency (insert) order.
pub const TABLES: [&TableSpec; 6] = [
    &ROLES,
    &RESOURCES,
    &ROLE_MEMBERSHIPS,
    &PERMISSIONS,
    &ANNOTATIONS,
    &CREDENTIALS,
];

impl TableSpec {
    /// The relations statements stage rows into.
    pub fn staged() -> impl Iterator<Item = &'static TableSpec> {
        TABLES.into_iter().filter(|t| t.policy_tagged)
    }

    /// Schema-qualified table reference.
    #[must_use]
    pub fn qualified(&self, schema: &str) -> String {
        format!("{schema}.{}", self.name)
    }

    /// Compared columns as a `SELECT`/`INSERT` list.
    #[must_use]
    pub fn column_list(&self) -> String {
        self.compared.join(", ")
    }

    /// Compared columns minus the primary key.
    #[must_use]
    pub fn non_key_columns(&self) -> Vec<&'static str> {
        self.compared
            .iter()
            .filter(|c| !self.primary_key.contains(c))
            .copied()
            .collect()
    }

    /// Primary-key equality predicate between two row aliases.
    ///
    /// Primary-key columns are non-null, so plain `=` is exact.
    #[must_use]
    pub fn pk_match(&self, left: &str, right: &str) -> String {
        self.primary_key
            .iter()
            .map(|c| format!("{left}.{c} = {right}.{c}"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Whole-row equality predicate over all compared columns.
    ///
    /// Uses `IS NOT DISTINCT FROM` so NULL policy tags compare equal.
    #[must_use]
    pub fn row_match(&self, left: &str, right: &str) -> String {
        self.compared
            .iter()
            .map(|c| format!("{left}.{c} IS NOT DISTINCT FROM {right}.{c}"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Predicate: any non-key column differs between two row aliases.
    #[must_use]
    pub fn any_column_differs(&self, left: &str, right: &str) -> String {
        self.non_key_columns()
            .iter()
            .map(|c| format!("{left}.{c} IS DISTINCT FROM {right}.{c}"))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// `SET` clause assigning every non-key column from a source alias.
    #[must_use]
    pub fn update_set_clause(&self, source: &str) -> String {
        self.non_key_columns()
            .iter()
            .map(|c| format!("{c} = {source}.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `jsonb_build_object` expression for the primary key of a row alias.
    #[must_use]
    pub fn subject_json(&self, alias: &str) -> String {
        let pairs = self
            .primary_key
            .iter()
            .map(|c| format!("'{c}', {alias}.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("jsonb_build_object({pairs})")
    }

    /// `ORDER BY` list over the primary key of a row alias, identifying
    /// columns first, for deterministic human-readable output.
    #[must_use]
    pub fn order_by(&self, alias: &str) -> String {
        self.primary_key
            .iter()
            .map(|c| format!("{alias}.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// DDL mirroring this table's structure into a staging schema:
    /// columns, defaults, and primary key, but no foreign keys, so
    /// statements can stage rows in any order.
    #[must_use]
    pub fn mirror_sql(&self, staging_schema: &str) -> String {
        format!(
            "CREATE TABLE {}.{} (LIKE {}.{} INCLUDING DEFAULTS INCLUDING INDEXES)",
            staging_schema, self.name, LIVE_SCHEMA, self.name
        )
    }

    /// DDL snapshotting this table's compared columns into a schema.
    /// Secrets and timestamps are left behind.
    #[must_use]
    pub fn snapshot_sql(&self, snapshot_schema: &str) -> String {
        format!(
            "CREATE TABLE {}.{} AS SELECT {} FROM {}.{}",
            snapshot_schema,
            self.name,
            self.column_list(),
            LIVE_SCHEMA,
            self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_cover_all_six_relations() {
        let names: Vec<_> = TABLES.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "roles",
                "resources",
                "role_memberships",
                "permissions",
                "annotations",
                "credentials"
            ]
        );
    }

    #[test]
    fn test_credentials_are_neither_staged_nor_diffable() {
        assert!(!CREDENTIALS.policy_tagged);
        assert!(!CREDENTIALS.diffable);
        assert!(!CREDENTIALS.compared.contains(&"api_key"));
        assert_eq!(TableSpec::staged().count(), 5);
    }

    #[test]
    fn test_timestamps_are_never_compared() {
        for table in TABLES {
            assert!(
                !table.compared.contains(&"created_at"),
                "{} compares created_at",
                table.name
            );
        }
    }

    #[test]
    fn test_pk_match() {
        assert_eq!(
            ROLE_MEMBERSHIPS.pk_match("l", "s"),
            "l.role_id = s.role_id AND l.member_id = s.member_id"
        );
    }

    #[test]
    fn test_row_match_includes_policy_tag() {
        let sql = ROLES.row_match("a", "b");
        assert_eq!(
            sql,
            "a.role_id IS NOT DISTINCT FROM b.role_id \
             AND a.policy_id IS NOT DISTINCT FROM b.policy_id"
        );
    }

    #[test]
    fn test_update_set_clause_skips_key_columns() {
        assert_eq!(
            ANNOTATIONS.update_set_clause("s"),
            "value = s.value, policy_id = s.policy_id"
        );
    }

    #[test]
    fn test_subject_json() {
        assert_eq!(
            PERMISSIONS.subject_json("d"),
            "jsonb_build_object('resource_id', d.resource_id, \
             'privilege', d.privilege, 'role_id', d.role_id)"
        );
    }

    #[test]
    fn test_mirror_and_snapshot_ddl() {
        assert_eq!(
            ROLES.mirror_sql("policy_loader_ab12"),
            "CREATE TABLE policy_loader_ab12.roles \
             (LIKE public.roles INCLUDING DEFAULTS INCLUDING INDEXES)"
        );
        assert_eq!(
            CREDENTIALS.snapshot_sql("policy_dryrun_ab12"),
            "CREATE TABLE policy_dryrun_ab12.credentials AS \
             SELECT role_id, client_id, restricted_to FROM public.credentials"
        );
    }
}
