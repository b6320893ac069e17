//! Validate-mode strategies.
//!
//! Validation checks document syntax only: every merge phase is a
//! no-op, and the outcome of the external parser is converted into a
//! structured pass/fail report. The replace variant additionally gates
//! on the caller holding `update` permission over the policy's
//! descendants before even reaching the no-op phases; that check is a
//! boundary concern, not part of the merge algorithm.

use arx_core::{PolicyId, RoleId};
use arx_db::DbPool;

use crate::error::{classify_sqlx, PolicyError, Result};
use crate::report::{DryRunReport, ParseIssue};
use crate::schema::LIVE_SCHEMA;
use crate::types::PolicyLoad;
use crate::visibility::closure_cte;

/// What the external document parser produced.
///
/// The parser is an external collaborator; the engine only consumes its
/// outcome and, on failure, passes the structured errors through
/// unchanged.
#[derive(Debug)]
pub enum ParseOutcome {
    /// The document parsed into a load.
    Parsed(PolicyLoad),

    /// The document failed to parse.
    Failed(Vec<ParseIssue>),
}

/// Validate a document: a no-op load that reports syntax validity.
#[must_use]
pub fn validate(outcome: &ParseOutcome) -> DryRunReport {
    match outcome {
        ParseOutcome::Parsed(load) => {
            tracing::debug!(policy_id = %load.policy_id, "Document validated");
            DryRunReport::valid()
        }
        ParseOutcome::Failed(errors) => DryRunReport::invalid(errors.clone()),
    }
}

/// Validate a document for replace-mode loading.
///
/// # Errors
///
/// Returns [`PolicyError::AuthorizationDenied`] if `actor_role_id` does
/// not hold `update` on the policy's resource subtree.
pub async fn validate_replace(
    pool: &DbPool,
    policy_id: &PolicyId,
    actor_role_id: &RoleId,
    outcome: &ParseOutcome,
) -> Result<DryRunReport> {
    ensure_may_replace(pool, policy_id, actor_role_id).await?;
    Ok(validate(outcome))
}

/// Check that `actor_role_id`'s transitive role closure holds `update`
/// on the policy resource and every descendant policy resource.
pub async fn ensure_may_replace(
    pool: &DbPool,
    policy_id: &PolicyId,
    actor_role_id: &RoleId,
) -> Result<()> {
    let sql = format!(
        "{cte} \
         SELECT r.resource_id FROM {live}.resources r \
         WHERE (r.resource_id = $2 OR r.resource_id LIKE $2 || '/%') \
         AND NOT ( \
         r.owner_id IN (SELECT role_id FROM closure) \
         OR EXISTS ( \
         SELECT 1 FROM {live}.permissions p \
         WHERE p.resource_id = r.resource_id \
         AND p.privilege = 'update' \
         AND p.role_id IN (SELECT role_id FROM closure))) \
         ORDER BY r.resource_id LIMIT 1",
        cte = closure_cte(LIVE_SCHEMA),
        live = LIVE_SCHEMA,
    );

    let subtree_root = policy_id.as_resource();
    let denied: Option<String> = sqlx::query_scalar(&sql)
        .bind(actor_role_id.as_str())
        .bind(subtree_root.as_str())
        .fetch_optional(pool.inner())
        .await
        .map_err(classify_sqlx)?;

    match denied {
        Some(resource_id) => Err(PolicyError::AuthorizationDenied {
            role_id: actor_role_id.to_string(),
            privilege: "update".to_string(),
            resource_id,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ValidationStatus;

    #[test]
    fn test_failed_parse_reports_invalid_yaml() {
        let outcome = ParseOutcome::Failed(vec![ParseIssue {
            message: "did not find expected key".to_string(),
            line: Some(7),
            column: None,
        }]);
        let report = validate(&outcome);
        assert_eq!(report.status, ValidationStatus::Invalid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.created.items.is_empty());
    }

    #[test]
    fn test_parsed_document_reports_valid_yaml_with_empty_delta() {
        let outcome = ParseOutcome::Parsed(PolicyLoad::new(
            "rspec",
            "rspec:policy:root".parse().unwrap(),
            "rspec:user:admin".parse().unwrap(),
        ));
        let report = validate(&outcome);
        assert_eq!(report.status, ValidationStatus::Valid);
        assert!(report.errors.is_empty());
        assert!(report.deleted.items.is_empty());
    }
}
