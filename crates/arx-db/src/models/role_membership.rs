//! Role membership entity model.
//!
//! Role-in-role grants. A membership row states that `member_id` is a
//! member of `role_id`; `admin_option` lets the member grant the role
//! onward, `ownership` marks the owner-derived grant created when a
//! role is declared with an explicit owner.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A role-in-role grant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoleMembership {
    /// The granted role.
    pub role_id: String,

    /// The member holding the grant.
    pub member_id: String,

    /// Whether the member may grant the role onward.
    pub admin_option: bool,

    /// Whether this grant records ownership of the role.
    pub ownership: bool,

    /// Policy load that owns this row; `None` for bootstrap rows.
    pub policy_id: Option<String>,
}

impl RoleMembership {
    /// Insert a membership row.
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
        member_id: &str,
        admin_option: bool,
        ownership: bool,
        policy_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO role_memberships (role_id, member_id, admin_option, ownership, policy_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(role_id)
        .bind(member_id)
        .bind(admin_option)
        .bind(ownership)
        .bind(policy_id)
        .fetch_one(executor)
        .await
    }

    /// Find a specific grant.
    pub async fn find(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
        member_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM role_memberships WHERE role_id = $1 AND member_id = $2
            ",
        )
        .bind(role_id)
        .bind(member_id)
        .fetch_optional(executor)
        .await
    }

    /// List all grants of a role, ordered by member.
    pub async fn list_for_role(
        executor: impl sqlx::PgExecutor<'_>,
        role_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM role_memberships WHERE role_id = $1 ORDER BY member_id
            ",
        )
        .bind(role_id)
        .fetch_all(executor)
        .await
    }
}
