//! Arx database layer.
//!
//! PostgreSQL access for the Arx access-control fact base:
//!
//! - [`DbPool`] - connection pool handle, configured from the environment
//! - [`run_migrations`] - embedded, versioned schema migrations
//! - [`models`] - the six access-control relations (`roles`, `resources`,
//!   `role_memberships`, `permissions`, `annotations`, `credentials`)
//!   plus the policy audit trail (`policy_versions`, `policy_log`)
//!
//! Write access to the six relations normally goes through the
//! reconciliation engine in `arx-policy`; the models here cover direct
//! reads, bootstrap writes, and test setup.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{DbConfig, DbPool};
