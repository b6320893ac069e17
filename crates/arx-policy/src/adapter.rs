//! Statement adapter: turns one parsed statement into idempotent
//! staging-area mutations, or removes its live counterpart.
//!
//! Statements are processed in document order, and reference resolution
//! consults the staging area before live state, so later statements may
//! reference roles created by earlier ones within the same load. All
//! references a statement makes are resolved before any staging row is
//! written for it; an unresolved reference fails the load with
//! [`PolicyError::ReferenceNotFound`].

use sqlx::PgConnection;

use crate::error::{classify_sqlx, PolicyError, Result};
use crate::schema::{LIVE_SCHEMA, RESOURCES, ROLES};
use crate::staging::StagingArea;
use crate::statement::PolicyStatement;
use crate::audit::delete_with_log_sql;

/// Materializes statements into one load's staging area.
pub struct StatementAdapter<'a> {
    staging: &'a StagingArea,
}

impl<'a> StatementAdapter<'a> {
    /// Adapter writing into `staging`.
    #[must_use]
    pub fn new(staging: &'a StagingArea) -> Self {
        Self { staging }
    }

    /// Stage every row a create statement declares, tagged with
    /// `policy_id`.
    ///
    /// Role-capable statements stage a role row plus the membership
    /// granting the owner admin option and ownership over it.
    /// Resource-capable statements stage a resource row plus one
    /// annotation row per declared annotation. Declared role grants and
    /// privilege grants stage membership and permission rows, with
    /// unset nullable booleans defaulted to false.
    pub async fn materialize(
        &self,
        conn: &mut PgConnection,
        statement: &dyn PolicyStatement,
        policy_id: &str,
    ) -> Result<()> {
        // Resolve every reference before writing anything for this
        // statement.
        if let Some(owner) = statement.owner_id() {
            self.ensure_role_resolves(&mut *conn, owner.as_str()).await?;
        }
        for grant in statement.memberships() {
            self.ensure_role_resolves(&mut *conn, grant.member_id.as_str())
                .await?;
        }
        for permit in statement.permits() {
            self.ensure_role_resolves(&mut *conn, permit.role_id.as_str())
                .await?;
        }

        if statement.is_role() {
            self.stage_role(&mut *conn, statement, policy_id).await?;
        }
        if statement.is_resource() {
            self.stage_resource(&mut *conn, statement, policy_id).await?;
        }

        tracing::trace!(
            id = statement.id(),
            kind = statement.kind().unwrap_or("unknown"),
            "Statement staged"
        );
        Ok(())
    }

    async fn stage_role(
        &self,
        conn: &mut PgConnection,
        statement: &dyn PolicyStatement,
        policy_id: &str,
    ) -> Result<()> {
        let roles = self.staging.qualify(&ROLES);
        sqlx::query(&format!(
            "INSERT INTO {roles} (role_id, policy_id) VALUES ($1, $2) \
             ON CONFLICT (role_id) DO NOTHING"
        ))
        .bind(statement.id())
        .bind(policy_id)
        .execute(&mut *conn)
        .await
        .map_err(classify_sqlx)?;

        let memberships = self.staging.qualify(&crate::schema::ROLE_MEMBERSHIPS);

        // The owner holds the role with admin option; the grant records
        // ownership.
        if let Some(owner) = statement.owner_id() {
            sqlx::query(&format!(
                "INSERT INTO {memberships} \
                 (role_id, member_id, admin_option, ownership, policy_id) \
                 VALUES ($1, $2, true, true, $3) \
                 ON CONFLICT (role_id, member_id) \
                 DO UPDATE SET admin_option = true, ownership = true"
            ))
            .bind(statement.id())
            .bind(owner.as_str())
            .bind(policy_id)
            .execute(&mut *conn)
            .await
            .map_err(classify_sqlx)?;
        }

        for grant in statement.memberships() {
            sqlx::query(&format!(
                "INSERT INTO {memberships} \
                 (role_id, member_id, admin_option, ownership, policy_id) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (role_id, member_id) DO NOTHING"
            ))
            .bind(statement.id())
            .bind(grant.member_id.as_str())
            .bind(grant.admin_option.unwrap_or(false))
            .bind(grant.ownership.unwrap_or(false))
            .bind(policy_id)
            .execute(&mut *conn)
            .await
            .map_err(classify_sqlx)?;
        }

        Ok(())
    }

    async fn stage_resource(
        &self,
        conn: &mut PgConnection,
        statement: &dyn PolicyStatement,
        policy_id: &str,
    ) -> Result<()> {
        let owner = statement
            .owner_id()
            .ok_or_else(|| PolicyError::ReferenceNotFound {
                id: statement.id().to_string(),
            })?;

        let resources = self.staging.qualify(&RESOURCES);
        sqlx::query(&format!(
            "INSERT INTO {resources} (resource_id, owner_id, policy_id) \
             VALUES ($1, $2, $3) ON CONFLICT (resource_id) DO NOTHING"
        ))
        .bind(statement.id())
        .bind(owner.as_str())
        .bind(policy_id)
        .execute(&mut *conn)
        .await
        .map_err(classify_sqlx)?;

        let annotations = self.staging.qualify(&crate::schema::ANNOTATIONS);
        for (name, value) in statement.annotations() {
            // Later statements in the document override earlier values.
            sqlx::query(&format!(
                "INSERT INTO {annotations} (resource_id, name, value, policy_id) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (resource_id, name) DO UPDATE SET value = EXCLUDED.value"
            ))
            .bind(statement.id())
            .bind(name)
            .bind(value)
            .bind(policy_id)
            .execute(&mut *conn)
            .await
            .map_err(classify_sqlx)?;
        }

        let permissions = self.staging.qualify(&crate::schema::PERMISSIONS);
        for permit in statement.permits() {
            sqlx::query(&format!(
                "INSERT INTO {permissions} (resource_id, privilege, role_id, policy_id) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (resource_id, privilege, role_id) DO NOTHING"
            ))
            .bind(statement.id())
            .bind(&permit.privilege)
            .bind(permit.role_id.as_str())
            .bind(policy_id)
            .execute(&mut *conn)
            .await
            .map_err(classify_sqlx)?;
        }

        Ok(())
    }

    /// Remove a statement's live counterpart, logging one delete entry
    /// per removed row. Dependent rows follow the store's referential
    /// cascade rules. Removing an id that does not exist is a no-op, so
    /// repeated loads stay idempotent.
    pub async fn remove(
        conn: &mut PgConnection,
        statement: &dyn PolicyStatement,
        policy_id: &str,
        version: i32,
    ) -> Result<()> {
        // Resources first: dropping the role first would cascade the
        // resource away without an audit entry.
        if statement.is_resource() {
            sqlx::query(&delete_with_log_sql(&RESOURCES, "l.resource_id = $3"))
                .bind(policy_id)
                .bind(version)
                .bind(statement.id())
                .execute(&mut *conn)
                .await
                .map_err(classify_sqlx)?;
        }
        if statement.is_role() {
            sqlx::query(&delete_with_log_sql(&ROLES, "l.role_id = $3"))
                .bind(policy_id)
                .bind(version)
                .bind(statement.id())
                .execute(&mut *conn)
                .await
                .map_err(classify_sqlx)?;
        }

        tracing::debug!(id = statement.id(), "Statement removed");
        Ok(())
    }

    /// Resolve a role id against the staging area, then live state.
    async fn ensure_role_resolves(&self, conn: &mut PgConnection, id: &str) -> Result<()> {
        let staged_roles = self.staging.qualify(&ROLES);
        let resolves: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM {staged_roles} WHERE role_id = $1) \
             OR EXISTS (SELECT 1 FROM {LIVE_SCHEMA}.roles WHERE role_id = $1)"
        ))
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(classify_sqlx)?;

        if resolves {
            Ok(())
        } else {
            Err(PolicyError::ReferenceNotFound { id: id.to_string() })
        }
    }
}
