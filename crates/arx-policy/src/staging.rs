//! Staging area lifecycle.
//!
//! Each load stages its proposed new state in a uniquely named,
//! ephemeral schema. The schema is created inside the load's
//! transaction and dropped by the final phase; if any phase fails, the
//! rollback removes it too, since schema DDL is transactional in
//! PostgreSQL.
//!
//! The name is a random token with no collision check. Concurrent loads
//! are expected to be serialized by the caller (see crate docs); the
//! random name is not a concurrency guarantee.

use rand::RngCore;
use sqlx::PgConnection;

use crate::error::{classify_sqlx, Result};
use crate::schema::TableSpec;

/// Prefix for staging schema names.
const STAGING_PREFIX: &str = "policy_loader_";

/// Number of random bytes in the schema name token.
const TOKEN_BYTES: usize = 6;

/// An ephemeral schema holding one load's proposed new state.
#[derive(Debug, Clone)]
pub struct StagingArea {
    name: String,
}

impl StagingArea {
    /// Generate a staging area with a fresh random name.
    #[must_use]
    pub fn generate() -> Self {
        let mut token = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut token);
        Self {
            name: format!("{STAGING_PREFIX}{}", hex::encode(token)),
        }
    }

    /// The schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema-qualified reference to a staged table.
    #[must_use]
    pub fn qualify(&self, table: &TableSpec) -> String {
        table.qualified(&self.name)
    }

    /// Create the schema and mirror the staged tables' structure into
    /// it: columns, defaults, and primary keys, but no foreign keys.
    pub(crate) async fn create(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA {}", self.name))
            .execute(&mut *conn)
            .await
            .map_err(classify_sqlx)?;

        for table in TableSpec::staged() {
            sqlx::query(&table.mirror_sql(&self.name))
                .execute(&mut *conn)
                .await
                .map_err(classify_sqlx)?;
        }

        tracing::debug!(staging_area = %self.name, "Staging area created");
        Ok(())
    }

    /// Drop the schema and everything staged in it.
    pub(crate) async fn drop(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.name))
            .execute(&mut *conn)
            .await
            .map_err(classify_sqlx)?;

        tracing::debug!(staging_area = %self.name, "Staging area dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_schema_safe() {
        let staging = StagingArea::generate();
        assert!(staging.name().starts_with(STAGING_PREFIX));
        assert_eq!(staging.name().len(), STAGING_PREFIX.len() + TOKEN_BYTES * 2);
        assert!(staging
            .name()
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn test_generated_names_differ() {
        // Collision-prone by design, but two draws colliding would mean
        // a broken RNG.
        assert_ne!(StagingArea::generate().name(), StagingArea::generate().name());
    }

    #[test]
    fn test_qualify() {
        let staging = StagingArea {
            name: "policy_loader_test".to_string(),
        };
        assert_eq!(
            staging.qualify(&crate::schema::ROLES),
            "policy_loader_test.roles"
        );
    }
}
