//! Strongly Typed Qualified Identifiers
//!
//! Every role, resource, and policy in Arx is addressed by a qualified
//! identifier of the form `account:kind:identifier`, e.g.
//! `rspec:user:alice` or `rspec:policy:prod/db`. The identifier segment
//! may itself contain colons and slashes; only the first two separators
//! are structural.
//!
//! Using the newtype pattern, these types prevent accidental misuse of
//! different ID types at compile time.
//!
//! # Example
//!
//! ```
//! use arx_core::{ResourceId, RoleId};
//!
//! let owner: RoleId = "rspec:user:admin".parse().unwrap();
//! let variable: ResourceId = "rspec:variable:db/password".parse().unwrap();
//!
//! // Type safety: cannot pass a ResourceId where a RoleId is expected
//! fn requires_role(id: &RoleId) -> &str {
//!     id.as_str()
//! }
//!
//! let account = requires_role(&owner);
//! assert_eq!(variable.kind(), "variable");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Error type for qualified identifier parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse {id_type}: {message}")]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// What was wrong with the input.
    pub message: String,
}

/// Validate and split a qualified identifier into its three segments.
fn split_qualified(s: &str, id_type: &'static str) -> Result<(), ParseIdError> {
    let mut parts = s.splitn(3, ':');
    let account = parts.next().unwrap_or_default();
    let kind = parts.next();
    let identifier = parts.next();

    match (kind, identifier) {
        (Some(kind), Some(identifier))
            if !account.is_empty() && !kind.is_empty() && !identifier.is_empty() =>
        {
            Ok(())
        }
        _ => Err(ParseIdError {
            id_type,
            message: format!("expected account:kind:identifier, got {s:?}"),
        }),
    }
}

/// Macro to define a strongly-typed qualified identifier.
macro_rules! define_qualified_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Build an identifier from its three segments.
            #[must_use]
            pub fn new(account: &str, kind: &str, identifier: &str) -> Self {
                Self(format!("{account}:{kind}:{identifier}"))
            }

            /// The full qualified identifier string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The account segment.
            #[must_use]
            pub fn account(&self) -> &str {
                self.0.split(':').next().unwrap_or_default()
            }

            /// The kind segment (`user`, `group`, `variable`, ...).
            #[must_use]
            pub fn kind(&self) -> &str {
                self.0.splitn(3, ':').nth(1).unwrap_or_default()
            }

            /// The identifier segment. May contain further colons and slashes.
            #[must_use]
            pub fn identifier(&self) -> &str {
                self.0.splitn(3, ':').nth(2).unwrap_or_default()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                split_qualified(s, stringify!($name))?;
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_qualified_id!(
    /// Strongly typed identifier for roles.
    ///
    /// A role is an identity or group that can hold permissions, e.g.
    /// `rspec:user:alice` or `rspec:group:ops`.
    RoleId
);

define_qualified_id!(
    /// Strongly typed identifier for resources.
    ///
    /// A resource is a protectable object owned by a role, e.g.
    /// `rspec:variable:db/password` or `rspec:webservice:audit`.
    ResourceId
);

define_qualified_id!(
    /// Strongly typed identifier for policies.
    ///
    /// A policy identifier names the scope a policy load applies to,
    /// e.g. `rspec:policy:root` or `rspec:policy:prod/db`.
    PolicyId
);

impl RoleId {
    /// View this role as the resource with the same qualified id.
    ///
    /// Role-capable records are also resource-capable; both facets share
    /// one identifier.
    #[must_use]
    pub fn as_resource(&self) -> ResourceId {
        ResourceId(self.0.clone())
    }
}

impl PolicyId {
    /// View this policy as the resource it is protected by.
    #[must_use]
    pub fn as_resource(&self) -> ResourceId {
        ResourceId(self.0.clone())
    }
}
