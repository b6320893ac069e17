//! Delegated credential side effects.
//!
//! Password hashing and storage, public-key storage, and CIDR
//! restriction storage are not the engine's business: it delegates them
//! to an externally supplied handler once the owning roles and
//! resources exist. The default handler ignores everything; the
//! in-memory handler records calls for tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// Externally supplied credential side-effect handlers.
///
/// Invoked by the auxiliary-data phase, keyed by the roles and
/// resources the load just created. A handler failure aborts the load's
/// transaction like any other phase error.
#[async_trait]
pub trait CredentialHandlers: Send + Sync {
    /// Store a password for a role.
    async fn store_password(&self, role_id: &str, plaintext: &str) -> Result<()>;

    /// Store public-key material for a resource.
    async fn store_public_key(&self, resource_id: &str, key_material: &str) -> Result<()>;

    /// Restrict a role's credentials to a CIDR list.
    async fn store_restriction(&self, role_id: &str, cidrs: &[String]) -> Result<()>;
}

/// Handler that ignores every side effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCredentialHandlers;

#[async_trait]
impl CredentialHandlers for NoopCredentialHandlers {
    async fn store_password(&self, _role_id: &str, _plaintext: &str) -> Result<()> {
        Ok(())
    }

    async fn store_public_key(&self, _resource_id: &str, _key_material: &str) -> Result<()> {
        Ok(())
    }

    async fn store_restriction(&self, _role_id: &str, _cidrs: &[String]) -> Result<()> {
        Ok(())
    }
}

/// A recorded side-effect invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialEffect {
    /// A password was stored for a role.
    Password {
        /// The role.
        role_id: String,
        /// The plaintext handed to the handler.
        plaintext: String,
    },
    /// A public key was stored for a resource.
    PublicKey {
        /// The resource.
        resource_id: String,
        /// The key material.
        key_material: String,
    },
    /// A CIDR restriction was stored for a role.
    Restriction {
        /// The role.
        role_id: String,
        /// The CIDR list.
        cidrs: Vec<String>,
    },
}

/// Handler that records every side effect. Intended for tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialHandlers {
    effects: RwLock<Vec<CredentialEffect>>,
}

impl InMemoryCredentialHandlers {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded effects, in invocation order.
    pub async fn effects(&self) -> Vec<CredentialEffect> {
        self.effects.read().await.clone()
    }
}

#[async_trait]
impl CredentialHandlers for InMemoryCredentialHandlers {
    async fn store_password(&self, role_id: &str, plaintext: &str) -> Result<()> {
        self.effects.write().await.push(CredentialEffect::Password {
            role_id: role_id.to_string(),
            plaintext: plaintext.to_string(),
        });
        Ok(())
    }

    async fn store_public_key(&self, resource_id: &str, key_material: &str) -> Result<()> {
        self.effects
            .write()
            .await
            .push(CredentialEffect::PublicKey {
                resource_id: resource_id.to_string(),
                key_material: key_material.to_string(),
            });
        Ok(())
    }

    async fn store_restriction(&self, role_id: &str, cidrs: &[String]) -> Result<()> {
        self.effects
            .write()
            .await
            .push(CredentialEffect::Restriction {
                role_id: role_id.to_string(),
                cidrs: cidrs.to_vec(),
            });
        Ok(())
    }
}
