//! Arx policy reconciliation engine.
//!
//! Takes a declarative description of desired access-control state —
//! roles, resources, permissions, ownership, grants — and merges it
//! into the live relational fact base under one of three merge
//! semantics, plus a non-destructive dry run that reports what a merge
//! would do.
//!
//! # How a load works
//!
//! The caller picks a [`LoadAction`] and hands [`PolicyLoader::load`] a
//! [`PolicyLoad`] of parsed statements. The engine stages the proposed
//! state in an ephemeral schema, eliminates rows shadowed by other
//! policies or identical to live rows, applies the mode-specific
//! update/delete step, bulk-inserts what remains with batched audit
//! logging, and commits — or rolls everything back on the first error.
//! [`PolicyLoader::dry_run`] runs the same phases inside a transaction
//! it never commits and returns a [`DryRunReport`] delta instead.
//!
//! Document parsing, authentication, and HTTP mapping live outside this
//! crate. Statements arrive through the [`PolicyStatement`] capability
//! interface; credential side effects leave through
//! [`CredentialHandlers`]; lifecycle observers register in a
//! [`HookRegistry`].
//!
//! # Concurrency
//!
//! A load is synchronous and single-threaded: strictly sequential
//! phases, each a blocking database round-trip, all inside one
//! transaction on a dedicated connection. The engine provides **no
//! cross-load locking** beyond transactional isolation, and staging
//! schema names are random tokens with no collision check. Callers
//! submitting concurrent loads for overlapping policy scopes must
//! serialize them externally, e.g. with an advisory lock. There is no
//! mid-phase cancellation; the only cancellation path is an error
//! unwinding the transaction.

pub mod adapter;
pub mod audit;
pub mod diff;
pub mod dry_run;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod loader;
pub mod modes;
pub mod report;
pub mod schema;
pub mod staging;
pub mod statement;
pub mod types;
pub mod validation;
pub mod visibility;

// Re-export the engine surface
pub use adapter::StatementAdapter;
pub use diff::DiffEngine;
pub use error::{PolicyError, Result};
pub use handlers::{
    CredentialEffect, CredentialHandlers, InMemoryCredentialHandlers, NoopCredentialHandlers,
};
pub use hooks::{HookPayload, HookPoint, HookRegistry, LoadHooks, RecordingHooks};
pub use loader::{PolicyLoader, Reconciler};
pub use modes::{AppendMode, LoadAction, LoadMode, PatchMode, ReplaceMode};
pub use report::{DiffSection, DryRunReport, ParseIssue, UpdatedSection, ValidationStatus};
pub use schema::{TableSpec, LIVE_SCHEMA, TABLES};
pub use staging::StagingArea;
pub use statement::{
    MembershipGrant, PermissionGrant, PolicyStatement, Record, ResourceIdentity, RoleIdentity,
};
pub use types::{LoadOutcome, PolicyLoad};
pub use validation::{ensure_may_replace, validate, validate_replace, ParseOutcome};
pub use visibility::VisibilitySnapshot;
