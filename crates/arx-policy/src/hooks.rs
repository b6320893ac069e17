//! Lifecycle hooks for policy loads.
//!
//! The merge sequence exposes fixed extension points. Registrations are
//! an explicit ordered list, invoked in registration order at each
//! point; the mechanism is always present and inert unless configured.
//! Hook discovery and registration live outside this crate — callers
//! hand the engine a ready [`HookRegistry`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::PolicyLoad;

/// Named phase boundaries of a load.
///
/// `AfterLoad` fires when the staging area is dropped: that is the
/// defined "a load has completed" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Before any phase has run.
    BeforeLoad,
    /// Around the explicit-deletion phase.
    BeforeDelete,
    /// After the explicit-deletion phase.
    AfterDelete,
    /// Around staging-area creation.
    BeforeCreateStaging,
    /// After staging-area creation.
    AfterCreateStaging,
    /// Around the mode-specific update step.
    BeforeUpdate,
    /// After the mode-specific update step.
    AfterUpdate,
    /// Around the bulk insert of staged rows.
    BeforeInsert,
    /// After the bulk insert of staged rows.
    AfterInsert,
    /// After the staging area has been dropped.
    AfterLoad,
}

/// Payload handed to every hook invocation.
#[derive(Debug)]
pub struct HookPayload<'a> {
    /// The load being processed.
    pub load: &'a PolicyLoad,

    /// Name of the load's staging schema, once one exists.
    pub staging_area: Option<&'a str>,
}

/// A lifecycle callback observing policy loads.
#[async_trait]
pub trait LoadHooks: Send + Sync {
    /// Called at each [`HookPoint`]. Hooks observe; they cannot veto a
    /// phase or alter the load.
    async fn on_phase(&self, point: HookPoint, payload: &HookPayload<'_>);
}

/// Ordered list of hook registrations.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn LoadHooks>>,
}

impl HookRegistry {
    /// An empty, inert registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; hooks fire in registration order.
    pub fn register(&mut self, hook: Arc<dyn LoadHooks>) {
        self.hooks.push(hook);
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the registry is inert.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Notify every registered hook, in order.
    pub(crate) async fn notify(&self, point: HookPoint, payload: &HookPayload<'_>) {
        for hook in &self.hooks {
            hook.on_phase(point, payload).await;
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Hook that records every invocation. Intended for tests.
#[derive(Default)]
pub struct RecordingHooks {
    events: RwLock<Vec<(HookPoint, Option<String>)>>,
}

impl RecordingHooks {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded `(point, staging_area)` pairs, in invocation order.
    pub async fn events(&self) -> Vec<(HookPoint, Option<String>)> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl LoadHooks for RecordingHooks {
    async fn on_phase(&self, point: HookPoint, payload: &HookPayload<'_>) {
        self.events
            .write()
            .await
            .push((point, payload.staging_area.map(ToString::to_string)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_load() -> PolicyLoad {
        PolicyLoad::new(
            "rspec",
            "rspec:policy:root".parse().unwrap(),
            "rspec:user:admin".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_hooks_fire_in_registration_order() {
        let first = Arc::new(RecordingHooks::new());
        let second = Arc::new(RecordingHooks::new());

        let mut registry = HookRegistry::new();
        registry.register(first.clone());
        registry.register(second.clone());
        assert_eq!(registry.len(), 2);

        let load = empty_load();
        let payload = HookPayload {
            load: &load,
            staging_area: Some("policy_loader_test"),
        };
        registry.notify(HookPoint::BeforeLoad, &payload).await;
        registry.notify(HookPoint::AfterLoad, &payload).await;

        let events = first.events().await;
        assert_eq!(
            events,
            vec![
                (
                    HookPoint::BeforeLoad,
                    Some("policy_loader_test".to_string())
                ),
                (HookPoint::AfterLoad, Some("policy_loader_test".to_string())),
            ]
        );
        assert_eq!(second.events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_registry_is_inert() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());

        let load = empty_load();
        let payload = HookPayload {
            load: &load,
            staging_area: None,
        };
        // No registrations: notify is a no-op.
        registry.notify(HookPoint::BeforeInsert, &payload).await;
    }
}
