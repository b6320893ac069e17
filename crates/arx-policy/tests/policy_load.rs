//! Integration tests for committed policy loads.
//!
//! These tests require a running PostgreSQL instance.
//! Run with: `cargo test -p arx-policy --features integration`

#![cfg(feature = "integration")]

mod common;

use std::sync::Arc;

use common::TestContext;

use arx_db::models::{Annotation, PolicyLogEntry, PolicyVersion, Resource, Role, RoleMembership};
use arx_policy::{
    CredentialEffect, HookPoint, HookRegistry, InMemoryCredentialHandlers, LoadAction, PolicyLoad,
    PolicyLoader, Record, RecordingHooks,
};

// ===========================================================================
// Scenario: append into empty state
// ===========================================================================

#[tokio::test]
async fn test_append_creates_role_with_owner_admin_grant() {
    let ctx = TestContext::new().await;
    let policy = ctx.policy("root");

    let load = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()));

    let outcome = ctx
        .loader()
        .load(&ctx.pool, LoadAction::Append, load)
        .await
        .expect("Append load failed");

    let alice = ctx.role("user", "alice");
    assert!(outcome.new_roles.contains(&alice.to_string()));
    assert_eq!(outcome.version, 1);

    assert!(Role::exists(ctx.pool.inner(), alice.as_str()).await.unwrap());

    let grant = RoleMembership::find(ctx.pool.inner(), alice.as_str(), ctx.admin().as_str())
        .await
        .unwrap()
        .expect("Owner grant missing");
    assert!(grant.admin_option);
    assert!(grant.ownership);
    assert_eq!(grant.policy_id.as_deref(), Some(policy.as_str()));
}

#[tokio::test]
async fn test_append_is_monotonic() {
    let ctx = TestContext::new().await;
    let policy = ctx.policy("root");

    let first = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Append, first)
        .await
        .unwrap();

    let second = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .create(Record::group(&ctx.account, "ops", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Append, second)
        .await
        .unwrap();

    // Nothing implicitly deleted.
    assert!(Role::exists(ctx.pool.inner(), ctx.role("user", "alice").as_str())
        .await
        .unwrap());
    assert!(Role::exists(ctx.pool.inner(), ctx.role("group", "ops").as_str())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_later_statements_may_reference_earlier_ones() {
    let ctx = TestContext::new().await;
    let ops = ctx.role("group", "ops");

    let load = PolicyLoad::new(&ctx.account, ctx.policy("root"), ctx.admin())
        .create(Record::group(&ctx.account, "ops", ctx.admin()))
        .create(
            Record::user(&ctx.account, "alice", ctx.admin())
                .with_member(ops.clone(), Some(false)),
        )
        .create(
            Record::variable(&ctx.account, "db/password", ops.clone(), "password", "text/plain")
                .with_permit("read", ops.clone()),
        );

    ctx.loader()
        .load(&ctx.pool, LoadAction::Append, load)
        .await
        .expect("Forward references within one load must resolve");

    let variable = ctx.role("variable", "db/password");
    let resource = Resource::find_by_id(ctx.pool.inner(), variable.as_str())
        .await
        .unwrap()
        .expect("Variable resource missing");
    assert_eq!(resource.owner_id, ops.to_string());

    let annotations = Annotation::list_for_resource(ctx.pool.inner(), variable.as_str())
        .await
        .unwrap();
    let names: Vec<_> = annotations.iter().map(|a| a.name.as_str()).collect();
    assert!(names.contains(&"arx/kind"));
    assert!(names.contains(&"arx/mime_type"));
}

// ===========================================================================
// Error handling: reference resolution and atomicity
// ===========================================================================

#[tokio::test]
async fn test_unresolved_owner_aborts_the_whole_load() {
    let ctx = TestContext::new().await;
    let policy = ctx.policy("root");
    let ghost = ctx.role("user", "ghost");

    let load = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()))
        .create(Record::user(&ctx.account, "bob", ghost.clone()));

    let err = ctx
        .loader()
        .load(&ctx.pool, LoadAction::Append, load)
        .await
        .expect_err("Load with unresolved owner must fail");
    assert!(err.is_reference_not_found());
    assert!(err.to_string().contains(ghost.as_str()));

    // The earlier valid statement was rolled back with everything else.
    assert!(!Role::exists(ctx.pool.inner(), ctx.role("user", "alice").as_str())
        .await
        .unwrap());
    assert!(
        PolicyVersion::latest(ctx.pool.inner(), policy.as_str())
            .await
            .unwrap()
            .is_none(),
        "No version row may survive an aborted load"
    );
    assert_eq!(ctx.ephemeral_schema_count().await, 0);
}

// ===========================================================================
// Scenario: replace removes what the new document no longer declares
// ===========================================================================

#[tokio::test]
async fn test_replace_swaps_declared_roles_and_logs_both_sides() {
    let ctx = TestContext::new().await;
    let policy = ctx.policy("root");

    let first = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Replace, first)
        .await
        .unwrap();

    let second = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "bob", ctx.admin()));
    let outcome = ctx
        .loader()
        .load(&ctx.pool, LoadAction::Replace, second)
        .await
        .unwrap();

    let alice = ctx.role("user", "alice");
    let bob = ctx.role("user", "bob");
    assert!(!Role::exists(ctx.pool.inner(), alice.as_str()).await.unwrap());
    assert!(Role::exists(ctx.pool.inner(), bob.as_str()).await.unwrap());
    assert_eq!(outcome.new_roles, vec![bob.to_string()]);

    let log = PolicyLogEntry::list_for_version(ctx.pool.inner(), policy.as_str(), outcome.version)
        .await
        .unwrap();
    assert!(log.iter().any(|e| {
        e.operation == "DELETE" && e.kind == "roles" && e.subject["role_id"] == alice.as_str()
    }));
    assert!(log.iter().any(|e| {
        e.operation == "INSERT" && e.kind == "roles" && e.subject["role_id"] == bob.as_str()
    }));
}

#[tokio::test]
async fn test_replace_is_idempotent() {
    let ctx = TestContext::new().await;
    let policy = ctx.policy("root");

    let document = |ctx: &TestContext| {
        PolicyLoad::new(&ctx.account, ctx.policy("root"), ctx.admin())
            .create(Record::group(&ctx.account, "ops", ctx.admin()))
            .create(
                Record::user(&ctx.account, "alice", ctx.admin())
                    .with_member(ctx.role("group", "ops"), Some(true)),
            )
    };

    ctx.loader()
        .load(&ctx.pool, LoadAction::Replace, document(&ctx))
        .await
        .unwrap();
    let roles_after_first = ctx.rows_tagged("roles", policy.as_str()).await;
    let memberships_after_first = ctx.rows_tagged("role_memberships", policy.as_str()).await;

    let outcome = ctx
        .loader()
        .load(&ctx.pool, LoadAction::Replace, document(&ctx))
        .await
        .unwrap();

    // Zero net row churn on the second pass.
    assert_eq!(ctx.rows_tagged("roles", policy.as_str()).await, roles_after_first);
    assert_eq!(
        ctx.rows_tagged("role_memberships", policy.as_str()).await,
        memberships_after_first
    );
    assert!(outcome.new_roles.is_empty());
    let log = PolicyLogEntry::list_for_version(ctx.pool.inner(), policy.as_str(), outcome.version)
        .await
        .unwrap();
    assert!(log.is_empty(), "Second identical replace must log nothing");
}

#[tokio::test]
async fn test_replace_scopes_deletion_to_its_own_policy() {
    let ctx = TestContext::new().await;
    let policy_a = ctx.policy("a");
    let policy_b = ctx.policy("b");

    let load_a = PolicyLoad::new(&ctx.account, policy_a.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Replace, load_a)
        .await
        .unwrap();

    // Replacing policy B must not touch policy A's rows.
    let load_b = PolicyLoad::new(&ctx.account, policy_b.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "bob", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Replace, load_b)
        .await
        .unwrap();

    let alice = Role::find_by_id(ctx.pool.inner(), ctx.role("user", "alice").as_str())
        .await
        .unwrap()
        .expect("Policy A's role must survive policy B's replace");
    assert_eq!(alice.policy_id.as_deref(), Some(policy_a.as_str()));
}

// ===========================================================================
// Shadow protection
// ===========================================================================

#[tokio::test]
async fn test_colliding_declaration_under_other_policy_is_shadowed_out() {
    let ctx = TestContext::new().await;
    let policy_a = ctx.policy("a");
    let policy_b = ctx.policy("b");
    let alice = ctx.role("user", "alice");

    let load_a = PolicyLoad::new(&ctx.account, policy_a.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Append, load_a)
        .await
        .unwrap();

    // Policy B declares the same primary key: the load succeeds and
    // leaves A's row untouched.
    let load_b = PolicyLoad::new(&ctx.account, policy_b.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()));
    let outcome = ctx
        .loader()
        .load(&ctx.pool, LoadAction::Append, load_b)
        .await
        .expect("Shadowed load must not fail");

    assert!(!outcome.new_roles.contains(&alice.to_string()));
    let row = Role::find_by_id(ctx.pool.inner(), alice.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.policy_id.as_deref(), Some(policy_a.as_str()));
}

// ===========================================================================
// Scenario: patch updates in place
// ===========================================================================

#[tokio::test]
async fn test_patch_updates_changed_annotation_in_place() {
    let ctx = TestContext::new().await;
    let policy = ctx.policy("root");
    let variable = ctx.role("variable", "x");

    // Live state: the variable exists under this policy with an old
    // description.
    Resource::create(
        ctx.pool.inner(),
        variable.as_str(),
        ctx.admin().as_str(),
        Some(policy.as_str()),
    )
    .await
    .unwrap();
    Annotation::create(
        ctx.pool.inner(),
        variable.as_str(),
        "description",
        "old",
        Some(policy.as_str()),
    )
    .await
    .unwrap();

    let load = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin()).create(
        Record::variable(&ctx.account, "x", ctx.admin(), "password", "text/plain")
            .with_annotation("description", "new"),
    );
    ctx.loader()
        .load(&ctx.pool, LoadAction::Patch, load)
        .await
        .unwrap();

    let description = Annotation::find(ctx.pool.inner(), variable.as_str(), "description")
        .await
        .unwrap()
        .expect("Annotation missing");
    assert_eq!(description.value, "new");

    let all = Annotation::list_for_resource(ctx.pool.inner(), variable.as_str())
        .await
        .unwrap();
    assert_eq!(
        all.iter().filter(|a| a.name == "description").count(),
        1,
        "No duplicate annotation rows"
    );
}

// ===========================================================================
// Explicit deletions
// ===========================================================================

#[tokio::test]
async fn test_explicit_delete_removes_role_and_logs_it() {
    let ctx = TestContext::new().await;
    let policy = ctx.policy("root");
    let mallory = ctx.role("user", "mallory");

    let setup = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .create(Record::user(&ctx.account, "mallory", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Append, setup)
        .await
        .unwrap();

    let deletion = PolicyLoad::new(&ctx.account, policy.clone(), ctx.admin())
        .delete(Record::deletion(mallory.clone()));
    let outcome = ctx
        .loader()
        .load(&ctx.pool, LoadAction::Append, deletion)
        .await
        .unwrap();

    assert!(!Role::exists(ctx.pool.inner(), mallory.as_str()).await.unwrap());
    let log = PolicyLogEntry::list_for_version(ctx.pool.inner(), policy.as_str(), outcome.version)
        .await
        .unwrap();
    assert!(log.iter().any(|e| {
        e.operation == "DELETE" && e.kind == "roles" && e.subject["role_id"] == mallory.as_str()
    }));
}

// ===========================================================================
// Hooks and credential side effects
// ===========================================================================

#[tokio::test]
async fn test_hooks_fire_at_every_phase_boundary_in_order() {
    let ctx = TestContext::new().await;
    let recorder = Arc::new(RecordingHooks::new());
    let mut registry = HookRegistry::new();
    registry.register(recorder.clone());

    let load = PolicyLoad::new(&ctx.account, ctx.policy("root"), ctx.admin())
        .create(Record::user(&ctx.account, "alice", ctx.admin()));
    PolicyLoader::new()
        .with_hooks(registry)
        .load(&ctx.pool, LoadAction::Append, load)
        .await
        .unwrap();

    let events = recorder.events().await;
    let points: Vec<HookPoint> = events.iter().map(|(point, _)| *point).collect();
    assert_eq!(
        points,
        vec![
            HookPoint::BeforeLoad,
            HookPoint::BeforeDelete,
            HookPoint::AfterDelete,
            HookPoint::BeforeCreateStaging,
            HookPoint::AfterCreateStaging,
            HookPoint::BeforeUpdate,
            HookPoint::AfterUpdate,
            HookPoint::BeforeInsert,
            HookPoint::AfterInsert,
            HookPoint::AfterLoad,
        ]
    );

    // Every event names the same staging area.
    let staging: Vec<_> = events.iter().filter_map(|(_, s)| s.clone()).collect();
    assert_eq!(staging.len(), events.len());
    assert!(staging.iter().all(|s| s == &staging[0]));
    assert!(staging[0].starts_with("policy_loader_"));
}

#[tokio::test]
async fn test_auxiliary_data_is_delegated_for_created_records() {
    let ctx = TestContext::new().await;
    let handlers = Arc::new(InMemoryCredentialHandlers::new());

    let load = PolicyLoad::new(&ctx.account, ctx.policy("root"), ctx.admin()).create(
        Record::host(&ctx.account, "db", ctx.admin())
            .with_restricted_to(vec!["10.0.0.0/24".to_string()])
            .with_password("open sesame")
            .with_public_key("ssh-ed25519 AAAA"),
    );
    PolicyLoader::new()
        .with_handlers(handlers.clone())
        .load(&ctx.pool, LoadAction::Append, load)
        .await
        .unwrap();

    let host = ctx.role("host", "db");
    let effects = handlers.effects().await;
    assert!(effects.contains(&CredentialEffect::Password {
        role_id: host.to_string(),
        plaintext: "open sesame".to_string(),
    }));
    assert!(effects.contains(&CredentialEffect::Restriction {
        role_id: host.to_string(),
        cidrs: vec!["10.0.0.0/24".to_string()],
    }));
    assert!(effects.contains(&CredentialEffect::PublicKey {
        resource_id: host.to_string(),
        key_material: "ssh-ed25519 AAAA".to_string(),
    }));
}

#[tokio::test]
async fn test_auxiliary_data_is_skipped_for_shadowed_records() {
    let ctx = TestContext::new().await;

    let first = PolicyLoad::new(&ctx.account, ctx.policy("a"), ctx.admin())
        .create(Record::host(&ctx.account, "db", ctx.admin()));
    ctx.loader()
        .load(&ctx.pool, LoadAction::Append, first)
        .await
        .unwrap();

    // The colliding declaration creates nothing, so no side effects
    // may fire for it.
    let handlers = Arc::new(InMemoryCredentialHandlers::new());
    let second = PolicyLoad::new(&ctx.account, ctx.policy("b"), ctx.admin()).create(
        Record::host(&ctx.account, "db", ctx.admin()).with_password("should not be stored"),
    );
    PolicyLoader::new()
        .with_handlers(handlers.clone())
        .load(&ctx.pool, LoadAction::Append, second)
        .await
        .unwrap();

    assert!(handlers.effects().await.is_empty());
}
