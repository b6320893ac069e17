//! Arx Core Library
//!
//! Shared types for Arx, a secrets and identity management service.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed qualified identifiers (`RoleId`, `ResourceId`, `PolicyId`)
//!
//! # Example
//!
//! ```
//! use arx_core::RoleId;
//!
//! let role: RoleId = "rspec:user:alice".parse().unwrap();
//! assert_eq!(role.account(), "rspec");
//! assert_eq!(role.kind(), "user");
//! assert_eq!(role.identifier(), "alice");
//! ```

pub mod ids;

// Re-export main types for convenient access
pub use ids::{ParseIdError, PolicyId, ResourceId, RoleId};
