//! Policy load input and output types.

use arx_core::{PolicyId, RoleId};

use crate::statement::PolicyStatement;

/// One unit of reconciliation work.
///
/// Created once per request by the boundary layer, consumed exactly
/// once by one load mode. Statements are ordered: later statements may
/// reference roles and resources created by earlier ones within the
/// same load.
#[derive(Debug)]
pub struct PolicyLoad {
    /// Account the document belongs to.
    pub account: String,

    /// Policy scope the load applies to, e.g. `rspec:policy:prod/db`.
    /// Every row the load creates is tagged with this id.
    pub policy_id: PolicyId,

    /// Role submitting the load. Authentication and the general
    /// submit-permission check happen before the engine runs.
    pub actor_role_id: RoleId,

    /// Statements to materialize, in document order.
    pub create_statements: Vec<Box<dyn PolicyStatement>>,

    /// Statements explicitly marked for deletion, in document order.
    pub delete_statements: Vec<Box<dyn PolicyStatement>>,
}

impl PolicyLoad {
    /// A load with no statements yet.
    #[must_use]
    pub fn new(account: &str, policy_id: PolicyId, actor_role_id: RoleId) -> Self {
        Self {
            account: account.to_string(),
            policy_id,
            actor_role_id,
            create_statements: Vec::new(),
            delete_statements: Vec::new(),
        }
    }

    /// Append a create statement.
    #[must_use]
    pub fn create(mut self, statement: impl PolicyStatement + 'static) -> Self {
        self.create_statements.push(Box::new(statement));
        self
    }

    /// Append a delete statement.
    #[must_use]
    pub fn delete(mut self, statement: impl PolicyStatement + 'static) -> Self {
        self.delete_statements.push(Box::new(statement));
        self
    }
}

/// Result of a committed Append, Patch, or Replace load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Roles newly created by this load, in insertion order. The
    /// boundary layer issues credentials for these.
    pub new_roles: Vec<String>,

    /// The committed policy version.
    pub version: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Record;

    #[test]
    fn test_builder_preserves_document_order() {
        let admin: RoleId = "rspec:user:admin".parse().unwrap();
        let load = PolicyLoad::new(
            "rspec",
            "rspec:policy:root".parse().unwrap(),
            admin.clone(),
        )
        .create(Record::user("rspec", "alice", admin.clone()))
        .create(Record::group("rspec", "ops", admin.clone()))
        .delete(Record::deletion("rspec:user:mallory".parse().unwrap()));

        let ids: Vec<_> = load.create_statements.iter().map(|s| s.id()).collect();
        assert_eq!(ids, ["rspec:user:alice", "rspec:group:ops"]);
        assert_eq!(load.delete_statements[0].id(), "rspec:user:mallory");
        assert_eq!(load.account, "rspec");
    }
}
