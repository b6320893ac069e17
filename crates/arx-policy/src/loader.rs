//! Reconciliation orchestrator.
//!
//! [`PolicyLoader`] is the engine's entry point; [`Reconciler`] is the
//! per-load state machine driving the merge phases in strict order:
//!
//! 1. apply explicit deletions against live state
//! 2. create the staging area
//! 3. load statements into it
//! 4. eliminate rows shadowed by other policies
//! 5. eliminate exact duplicates of live rows
//! 6. mode-specific step (see [`crate::modes`])
//! 7. eliminate remaining primary-key duplicates
//! 8. bulk-insert what is left, with batched audit logging
//! 9. drop the staging area
//! 10. delegate credential side effects
//! 11. force-close the connection
//!
//! Steps 1-10 run inside one transaction on a dedicated connection; any
//! failure rolls everything back, including the staging schema, so no
//! partial load is ever observable.

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::{Connection, PgConnection};

use arx_db::models::PolicyVersion;
use arx_db::{DbError, DbPool};

use crate::adapter::StatementAdapter;
use crate::audit::staged_insert_log_sql;
use crate::error::{classify_sqlx, Result};
use crate::handlers::{CredentialHandlers, NoopCredentialHandlers};
use crate::hooks::{HookPayload, HookPoint, HookRegistry};
use crate::modes::LoadAction;
use crate::schema::{TableSpec, LIVE_SCHEMA, RESOURCES, ROLES};
use crate::staging::StagingArea;
use crate::types::{LoadOutcome, PolicyLoad};

/// The policy reconciliation engine.
///
/// Stateless across loads; hooks and credential handlers are supplied
/// once at construction and shared by every load.
pub struct PolicyLoader {
    hooks: HookRegistry,
    handlers: Arc<dyn CredentialHandlers>,
}

impl Default for PolicyLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyLoader {
    /// An engine with inert hooks and no-op credential handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: HookRegistry::new(),
            handlers: Arc::new(NoopCredentialHandlers),
        }
    }

    /// Replace the hook registry.
    #[must_use]
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the credential side-effect handlers.
    #[must_use]
    pub fn with_handlers(mut self, handlers: Arc<dyn CredentialHandlers>) -> Self {
        self.handlers = handlers;
        self
    }

    /// Apply one policy load under the given merge semantics.
    ///
    /// Commits on success and returns the roles the load created.
    /// On any error the transaction is rolled back and nothing is left
    /// live. The engine does not serialize concurrent loads; callers
    /// submitting overlapping policy scopes concurrently must hold an
    /// external advisory lock (see crate docs).
    pub async fn load(
        &self,
        pool: &DbPool,
        action: LoadAction,
        load: PolicyLoad,
    ) -> Result<LoadOutcome> {
        let conn = pool
            .inner()
            .acquire()
            .await
            .map_err(DbError::ConnectionFailed)?;
        // The load runs on a dedicated connection, outside the pool.
        let mut conn = conn.detach();

        let result = self.run(&mut conn, action, &load).await;

        // Force-close the connection: bounds per-connection metadata
        // cache growth across many sequential loads. Not required for
        // correctness.
        if let Err(err) = conn.close().await {
            tracing::warn!(error = %err, "Failed to close load connection");
        }

        result
    }

    async fn run(
        &self,
        conn: &mut PgConnection,
        action: LoadAction,
        load: &PolicyLoad,
    ) -> Result<LoadOutcome> {
        let mut tx = conn.begin().await.map_err(classify_sqlx)?;

        match Reconciler::run(
            &mut *tx,
            action,
            load,
            &self.hooks,
            Some(self.handlers.as_ref()),
        )
        .await
        {
            Ok(outcome) => {
                tx.commit().await.map_err(classify_sqlx)?;
                tracing::info!(
                    account = %load.account,
                    policy_id = %load.policy_id,
                    mode = action.name(),
                    version = outcome.version,
                    new_roles = outcome.new_roles.len(),
                    "Policy load committed"
                );
                Ok(outcome)
            }
            Err(err) => {
                // Rolls back every phase, including staging-schema DDL.
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                tracing::warn!(
                    policy_id = %load.policy_id,
                    mode = action.name(),
                    error = %err,
                    "Policy load aborted"
                );
                Err(err)
            }
        }
    }
}

/// Per-load state machine. Phases execute strictly in sequence; modes
/// compose the update/delete steps between duplicate eliminations.
pub struct Reconciler<'a> {
    conn: &'a mut PgConnection,
    load: &'a PolicyLoad,
    hooks: &'a HookRegistry,
    staging: StagingArea,
    version: i32,
    new_roles: Vec<String>,
    new_resources: Vec<String>,
}

impl<'a> Reconciler<'a> {
    /// Run every phase of one load on `conn`, which must be inside a
    /// transaction owned by the caller. `handlers` is `None` for dry
    /// runs, where credential side effects must not escape.
    pub(crate) async fn run(
        conn: &'a mut PgConnection,
        action: LoadAction,
        load: &'a PolicyLoad,
        hooks: &'a HookRegistry,
        handlers: Option<&dyn CredentialHandlers>,
    ) -> Result<LoadOutcome> {
        let version = PolicyVersion::create_next(
            &mut *conn,
            load.policy_id.as_str(),
            load.actor_role_id.as_str(),
        )
        .await
        .map_err(classify_sqlx)?
        .version;

        let mut rec = Self {
            conn,
            load,
            hooks,
            staging: StagingArea::generate(),
            version,
            new_roles: Vec::new(),
            new_resources: Vec::new(),
        };

        rec.notify(HookPoint::BeforeLoad).await;

        rec.notify(HookPoint::BeforeDelete).await;
        rec.perform_deletion().await?;
        rec.notify(HookPoint::AfterDelete).await;

        rec.notify(HookPoint::BeforeCreateStaging).await;
        rec.create_staging_area().await?;
        rec.notify(HookPoint::AfterCreateStaging).await;

        rec.load_records().await?;
        rec.eliminate_shadowed().await?;
        rec.eliminate_duplicates_exact().await?;

        rec.notify(HookPoint::BeforeUpdate).await;
        action.mode().reconcile(&mut rec).await?;
        rec.notify(HookPoint::AfterUpdate).await;

        rec.eliminate_duplicates_pk().await?;

        rec.notify(HookPoint::BeforeInsert).await;
        rec.insert_new().await?;
        rec.notify(HookPoint::AfterInsert).await;

        rec.drop_staging_area().await?;
        rec.notify(HookPoint::AfterLoad).await;

        if let Some(handlers) = handlers {
            rec.apply_auxiliary_data(handlers).await?;
        }

        Ok(LoadOutcome {
            new_roles: rec.new_roles,
            version,
        })
    }

    async fn notify(&self, point: HookPoint) {
        let payload = HookPayload {
            load: self.load,
            staging_area: Some(self.staging.name()),
        };
        self.hooks.notify(point, &payload).await;
    }

    /// Phase 1: apply explicit delete statements directly against live
    /// state, before any staging happens.
    async fn perform_deletion(&mut self) -> Result<()> {
        for statement in &self.load.delete_statements {
            StatementAdapter::remove(
                &mut *self.conn,
                statement.as_ref(),
                self.load.policy_id.as_str(),
                self.version,
            )
            .await?;
        }
        if !self.load.delete_statements.is_empty() {
            tracing::debug!(
                count = self.load.delete_statements.len(),
                "Explicit deletions applied"
            );
        }
        Ok(())
    }

    /// Phase 2: create the uniquely named staging schema.
    async fn create_staging_area(&mut self) -> Result<()> {
        self.staging.create(&mut *self.conn).await
    }

    /// Phase 3: materialize every create statement into the staging
    /// area, in document order, tagged with the load's policy id.
    async fn load_records(&mut self) -> Result<()> {
        let adapter = StatementAdapter::new(&self.staging);
        for statement in &self.load.create_statements {
            adapter
                .materialize(
                    &mut *self.conn,
                    statement.as_ref(),
                    self.load.policy_id.as_str(),
                )
                .await?;
        }
        tracing::debug!(
            account = %self.load.account,
            count = self.load.create_statements.len(),
            "Statements staged"
        );
        Ok(())
    }

    /// Phase 4: delete staged rows whose primary key matches a live row
    /// owned by a different policy. Protects other policies' data from
    /// being overwritten by this load; unowned bootstrap rows count as
    /// another policy's.
    async fn eliminate_shadowed(&mut self) -> Result<()> {
        for table in TableSpec::staged() {
            let sql = format!(
                "DELETE FROM {staged} s USING {live} l \
                 WHERE {pk} AND l.policy_id IS DISTINCT FROM $1",
                staged = self.staging.qualify(table),
                live = table.qualified(LIVE_SCHEMA),
                pk = table.pk_match("s", "l"),
            );
            let result = sqlx::query(&sql)
                .bind(self.load.policy_id.as_str())
                .execute(&mut *self.conn)
                .await
                .map_err(classify_sqlx)?;
            if result.rows_affected() > 0 {
                tracing::debug!(
                    table = table.name,
                    rows = result.rows_affected(),
                    "Shadowed rows eliminated"
                );
            }
        }
        Ok(())
    }

    /// Phase 5 (rerun by patch and replace after updating): delete
    /// staged rows identical to a live row in every compared column,
    /// including the policy tag. Nothing further to do for them.
    pub(crate) async fn eliminate_duplicates_exact(&mut self) -> Result<()> {
        for table in TableSpec::staged() {
            let sql = format!(
                "DELETE FROM {staged} s USING {live} l WHERE {row_match}",
                staged = self.staging.qualify(table),
                live = table.qualified(LIVE_SCHEMA),
                row_match = table.row_match("s", "l"),
            );
            sqlx::query(&sql)
                .execute(&mut *self.conn)
                .await
                .map_err(classify_sqlx)?;
        }
        Ok(())
    }

    /// Patch/replace step: update changed non-key columns in place for
    /// staged rows whose primary key already exists live, logging one
    /// entry per changed row.
    pub(crate) async fn update_matching(&mut self) -> Result<()> {
        for table in TableSpec::staged() {
            let result = sqlx::query(&crate::audit::update_with_log_sql(
                self.staging.name(),
                table,
            ))
            .bind(self.load.policy_id.as_str())
            .bind(self.version)
            .execute(&mut *self.conn)
            .await
            .map_err(classify_sqlx)?;
            if result.rows_affected() > 0 {
                tracing::debug!(
                    table = table.name,
                    rows = result.rows_affected(),
                    "Rows updated in place"
                );
            }
        }
        Ok(())
    }

    /// Replace step: delete live rows of this policy with no
    /// counterpart in the staged set. Children go first so every row
    /// gets its own audit entry rather than disappearing via cascade.
    /// Credentials are never deleted here.
    pub(crate) async fn delete_absent(&mut self) -> Result<()> {
        let mut staged: Vec<_> = TableSpec::staged().collect();
        staged.reverse();
        for table in staged {
            let predicate = format!(
                "l.policy_id = $1 AND NOT EXISTS \
                 (SELECT 1 FROM {staged} s WHERE {pk})",
                staged = self.staging.qualify(table),
                pk = table.pk_match("l", "s"),
            );
            let result = sqlx::query(&crate::audit::delete_with_log_sql(table, &predicate))
                .bind(self.load.policy_id.as_str())
                .bind(self.version)
                .execute(&mut *self.conn)
                .await
                .map_err(classify_sqlx)?;
            if result.rows_affected() > 0 {
                tracing::debug!(
                    table = table.name,
                    rows = result.rows_affected(),
                    "Absent rows deleted"
                );
            }
        }
        Ok(())
    }

    /// Phase 7: drop any staged rows whose primary key already exists
    /// live. Their content was reconciled by the mode step, or they are
    /// pure key collisions to be ignored.
    async fn eliminate_duplicates_pk(&mut self) -> Result<()> {
        for table in TableSpec::staged() {
            let sql = format!(
                "DELETE FROM {staged} s USING {live} l WHERE {pk}",
                staged = self.staging.qualify(table),
                live = table.qualified(LIVE_SCHEMA),
                pk = table.pk_match("s", "l"),
            );
            sqlx::query(&sql)
                .execute(&mut *self.conn)
                .await
                .map_err(classify_sqlx)?;
        }
        Ok(())
    }

    /// Phase 8: bulk-copy the remaining staged rows into the live
    /// relations and write one audit entry per inserted row, batched
    /// set-based rather than through a per-row trigger.
    async fn insert_new(&mut self) -> Result<()> {
        for table in TableSpec::staged() {
            let cols = table.column_list();
            let order = table.primary_key.join(", ");
            let staged = self.staging.qualify(table);
            let live = table.qualified(LIVE_SCHEMA);

            if table.name == ROLES.name {
                let sql = format!(
                    "INSERT INTO {live} ({cols}) \
                     SELECT {cols} FROM {staged} ORDER BY {order} RETURNING role_id"
                );
                self.new_roles = sqlx::query_scalar(&sql)
                    .fetch_all(&mut *self.conn)
                    .await
                    .map_err(classify_sqlx)?;
            } else if table.name == RESOURCES.name {
                let sql = format!(
                    "INSERT INTO {live} ({cols}) \
                     SELECT {cols} FROM {staged} ORDER BY {order} RETURNING resource_id"
                );
                self.new_resources = sqlx::query_scalar(&sql)
                    .fetch_all(&mut *self.conn)
                    .await
                    .map_err(classify_sqlx)?;
            } else {
                let sql = format!(
                    "INSERT INTO {live} ({cols}) SELECT {cols} FROM {staged} ORDER BY {order}"
                );
                sqlx::query(&sql)
                    .execute(&mut *self.conn)
                    .await
                    .map_err(classify_sqlx)?;
            }

            // Replay the equivalent per-row logging in one statement.
            sqlx::query(&staged_insert_log_sql(self.staging.name(), table))
                .bind(self.load.policy_id.as_str())
                .bind(self.version)
                .execute(&mut *self.conn)
                .await
                .map_err(classify_sqlx)?;
        }

        tracing::debug!(
            new_roles = self.new_roles.len(),
            new_resources = self.new_resources.len(),
            "Staged rows inserted"
        );
        Ok(())
    }

    /// Phase 9: drop the staging schema. This is the "load completed"
    /// signal for hooks.
    async fn drop_staging_area(&mut self) -> Result<()> {
        self.staging.drop(&mut *self.conn).await
    }

    /// Phase 10: delegate password, public-key, and restriction side
    /// effects to the supplied handlers, keyed by the roles and
    /// resources this load created.
    async fn apply_auxiliary_data(&self, handlers: &dyn CredentialHandlers) -> Result<()> {
        let new_roles: HashSet<&str> = self.new_roles.iter().map(String::as_str).collect();
        let new_resources: HashSet<&str> = self.new_resources.iter().map(String::as_str).collect();

        for statement in &self.load.create_statements {
            let id = statement.id();
            if new_roles.contains(id) {
                if let Some(password) = statement.password() {
                    handlers.store_password(id, password).await?;
                }
                if !statement.restricted_to().is_empty() {
                    handlers
                        .store_restriction(id, statement.restricted_to())
                        .await?;
                }
            }
            if new_resources.contains(id) {
                for key in statement.public_keys() {
                    handlers.store_public_key(id, key).await?;
                }
            }
        }
        Ok(())
    }
}
