//! Dry-run reporter: compute what a load would do without committing.
//!
//! The reporter snapshots the live relations (minus credential secret
//! material) into a disposable schema, runs the selected mode's phases
//! for real inside a transaction, diffs the snapshot against the merged
//! state, and rolls the transaction back. The rollback is the whole
//! containment mechanism: it removes the snapshot schema, the staging
//! schema, and every merge effect. Credential side-effect handlers and
//! caller-registered hooks are not invoked, since their effects would
//! escape the rollback.

use rand::RngCore;
use sqlx::{Connection, PgConnection};

use arx_db::{DbError, DbPool};

use crate::diff::DiffEngine;
use crate::error::{classify_sqlx, Result};
use crate::hooks::HookRegistry;
use crate::loader::{PolicyLoader, Reconciler};
use crate::modes::LoadAction;
use crate::report::DryRunReport;
use crate::schema::{LIVE_SCHEMA, TABLES};
use crate::types::PolicyLoad;
use crate::validation::ParseOutcome;
use crate::visibility;

/// Prefix for dry-run snapshot schema names.
const SNAPSHOT_PREFIX: &str = "policy_dryrun_";

/// Disposable schema holding the pre-load state of the six relations.
#[derive(Debug)]
struct SnapshotSchema {
    name: String,
}

impl SnapshotSchema {
    fn generate() -> Self {
        let mut token = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut token);
        Self {
            name: format!("{SNAPSHOT_PREFIX}{}", hex::encode(token)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// Clone the compared columns of all six relations. Secrets and
    /// timestamps never enter the snapshot.
    async fn create(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA {}", self.name))
            .execute(&mut *conn)
            .await
            .map_err(classify_sqlx)?;
        for table in TABLES {
            sqlx::query(&table.snapshot_sql(&self.name))
                .execute(&mut *conn)
                .await
                .map_err(classify_sqlx)?;
        }
        tracing::debug!(snapshot = %self.name, "Pre-load snapshot created");
        Ok(())
    }
}

impl PolicyLoader {
    /// Report what applying `outcome` under `action` would change,
    /// without changing anything.
    ///
    /// A document syntax failure short-circuits to an invalid report
    /// carrying the parser's errors; the staging mechanism is never
    /// touched in that case.
    pub async fn dry_run(
        &self,
        pool: &DbPool,
        action: LoadAction,
        outcome: ParseOutcome,
    ) -> Result<DryRunReport> {
        let load = match outcome {
            ParseOutcome::Failed(errors) => return Ok(DryRunReport::invalid(errors)),
            ParseOutcome::Parsed(load) => load,
        };

        let conn = pool
            .inner()
            .acquire()
            .await
            .map_err(DbError::ConnectionFailed)?;
        let mut conn = conn.detach();

        let result = dry_run_on(&mut conn, action, &load).await;

        if let Err(err) = conn.close().await {
            tracing::warn!(error = %err, "Failed to close dry-run connection");
        }

        result
    }
}

async fn dry_run_on(
    conn: &mut PgConnection,
    action: LoadAction,
    load: &PolicyLoad,
) -> Result<DryRunReport> {
    let mut tx = conn.begin().await.map_err(classify_sqlx)?;

    let simulated = simulate(&mut *tx, action, load).await;

    // Never commit: rolling back removes the snapshot schema, the
    // staging schema, and every merge effect.
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "Dry-run rollback failed");
    }

    if simulated.is_ok() {
        tracing::info!(
            policy_id = %load.policy_id,
            mode = action.name(),
            "Dry run completed"
        );
    }
    simulated
}

async fn simulate(
    conn: &mut PgConnection,
    action: LoadAction,
    load: &PolicyLoad,
) -> Result<DryRunReport> {
    let actor = load.actor_role_id.as_str().to_string();

    let before = SnapshotSchema::generate();
    before.create(&mut *conn).await?;
    let before_vis = visibility::snapshot(&mut *conn, before.name(), &actor).await?;

    // Run the selected mode's phases for real, against state the
    // rollback will discard. Hooks stay inert and credential handlers
    // are withheld.
    Reconciler::run(&mut *conn, action, load, &HookRegistry::new(), None).await?;

    let after_vis = visibility::snapshot(&mut *conn, LIVE_SCHEMA, &actor).await?;

    let mut report = DryRunReport::valid();

    for table in TABLES.into_iter().filter(|t| t.diffable) {
        let created = DiffEngine::unique_to(&mut *conn, before.name(), LIVE_SCHEMA, table).await?;
        report
            .created
            .items
            .extend(created.into_iter().filter(|row| after_vis.allows(table, row)));

        let deleted = DiffEngine::unique_to(&mut *conn, LIVE_SCHEMA, before.name(), table).await?;
        report.deleted.items.extend(
            deleted
                .into_iter()
                .filter(|row| before_vis.allows(table, row)),
        );
    }

    let changed: Vec<String> =
        DiffEngine::changed_entity_ids(&mut *conn, before.name(), LIVE_SCHEMA)
            .await?
            .into_iter()
            .collect();

    for table in TABLES.into_iter().filter(|t| t.diffable) {
        let before_rows =
            DiffEngine::original_state(&mut *conn, before.name(), &changed, table).await?;
        report.updated.before.items.extend(
            before_rows
                .into_iter()
                .filter(|row| before_vis.allows(table, row)),
        );

        let after_rows =
            DiffEngine::original_state(&mut *conn, LIVE_SCHEMA, &changed, table).await?;
        report.updated.after.items.extend(
            after_rows
                .into_iter()
                .filter(|row| after_vis.allows(table, row)),
        );
    }

    Ok(report)
}
