//! Load-mode strategies.
//!
//! Each mode composes the orchestrator's phases into one of the
//! supported merge semantics:
//!
//! | Mode    | Deletes unmentioned rows | Updates matching rows |
//! |---------|--------------------------|-----------------------|
//! | Append  | no (explicit only)       | no                    |
//! | Patch   | no (explicit only)       | in place              |
//! | Replace | yes, same policy only    | in place              |
//!
//! Validation is a no-op over these phases and lives in
//! [`crate::validation`].

use async_trait::async_trait;

use crate::error::Result;
use crate::loader::Reconciler;

/// Which merge semantics a load request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAction {
    /// Additive load: collisions are shadow/duplicate-eliminated only.
    Append,

    /// Incremental edit: matching rows are updated in place.
    Patch,

    /// Full state replacement within the policy scope.
    Replace,
}

impl LoadAction {
    /// The mode's wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.mode().name()
    }

    /// The strategy implementing this action.
    pub(crate) fn mode(self) -> &'static dyn LoadMode {
        match self {
            LoadAction::Append => &AppendMode,
            LoadAction::Patch => &PatchMode,
            LoadAction::Replace => &ReplaceMode,
        }
    }
}

/// A merge strategy: the mode-specific step between the first
/// duplicate elimination and the primary-key duplicate elimination.
#[async_trait]
pub trait LoadMode: Send + Sync {
    /// The mode's wire name.
    fn name(&self) -> &'static str;

    /// Run the mode-specific reconciliation step.
    async fn reconcile(&self, rec: &mut Reconciler<'_>) -> Result<()>;
}

/// First-time or additive load.
pub struct AppendMode;

#[async_trait]
impl LoadMode for AppendMode {
    fn name(&self) -> &'static str {
        "append"
    }

    async fn reconcile(&self, _rec: &mut Reconciler<'_>) -> Result<()> {
        // Nothing to reconcile: colliding rows were already shadowed
        // out or dropped as duplicates, and the rest is new.
        Ok(())
    }
}

/// Incremental edits: update changed columns for matching keys.
pub struct PatchMode;

#[async_trait]
impl LoadMode for PatchMode {
    fn name(&self) -> &'static str {
        "patch"
    }

    async fn reconcile(&self, rec: &mut Reconciler<'_>) -> Result<()> {
        rec.update_matching().await?;
        // Updated rows are now exact duplicates of their staged
        // counterparts; drop them before the insert.
        rec.eliminate_duplicates_exact().await
    }
}

/// Full replacement of the policy's state.
pub struct ReplaceMode;

#[async_trait]
impl LoadMode for ReplaceMode {
    fn name(&self) -> &'static str {
        "replace"
    }

    async fn reconcile(&self, rec: &mut Reconciler<'_>) -> Result<()> {
        rec.delete_absent().await?;
        rec.update_matching().await?;
        rec.eliminate_duplicates_exact().await
    }
}
