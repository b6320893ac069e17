//! Error types for the policy reconciliation engine.

use thiserror::Error;

use arx_db::DbError;

/// Result alias for policy engine operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Policy reconciliation errors.
///
/// Every variant is fatal for the current load: the enclosing
/// transaction is rolled back and no partial state is left live.
/// Loads are idempotent, so the caller's recovery path is to fix the
/// document and resubmit the whole load.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A statement references an owner or member that resolves to
    /// nothing, neither in the staging area nor in live state.
    #[error("Reference not found: {id}")]
    ReferenceNotFound {
        /// The qualified id that failed to resolve.
        id: String,
    },

    /// The database rejected a staging or commit phase (uniqueness,
    /// foreign key, or check constraint).
    #[error("Constraint violation: {source}")]
    ConstraintViolation {
        /// Name of the violated constraint, when the driver reports it.
        constraint: Option<String>,
        /// The underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// The caller may not perform this load.
    #[error("Role {role_id} does not hold {privilege} on {resource_id}")]
    AuthorizationDenied {
        /// The acting role.
        role_id: String,
        /// The missing privilege.
        privilege: String,
        /// The resource the privilege was required on.
        resource_id: String,
    },

    /// Any other database failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl PolicyError {
    /// Check if this error indicates an unresolved reference.
    #[must_use]
    pub fn is_reference_not_found(&self) -> bool {
        matches!(self, PolicyError::ReferenceNotFound { .. })
    }

    /// Check if this error indicates a database constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, PolicyError::ConstraintViolation { .. })
    }

    /// Check if this error indicates an authorization failure.
    #[must_use]
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, PolicyError::AuthorizationDenied { .. })
    }
}

/// Classify a raw `sqlx` error from a staging or commit phase.
///
/// Uniqueness, foreign-key, and check violations become
/// [`PolicyError::ConstraintViolation`]; everything else is wrapped as
/// a generic database failure.
pub(crate) fn classify_sqlx(err: sqlx::Error) -> PolicyError {
    if let Some(db_err) = err.as_database_error() {
        let kind = db_err.kind();
        if matches!(
            kind,
            sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::CheckViolation
                | sqlx::error::ErrorKind::NotNullViolation
        ) {
            let constraint = db_err.constraint().map(ToString::to_string);
            return PolicyError::ConstraintViolation {
                constraint,
                source: err,
            };
        }
    }
    PolicyError::Db(DbError::from(err))
}
