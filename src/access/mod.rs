//! Access Guard — membership and role checks.
//!
//! Every mutating operation in the engines calls [`authorize`] before
//! touching state; a failed check aborts the request with `AccessDenied`
//! and no partial mutation.

use sqlx::SqlitePool;

use crate::error::{DomainError, DomainResult};
use crate::storage::MembershipRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

/// Look up the acting user's active membership in a household.
///
/// Side-effect free. Returns `AccessDenied` when the membership is absent,
/// deactivated, or lacks the required role.
pub async fn authorize(
    pool: &SqlitePool,
    user_id: &str,
    household_id: &str,
    required: Role,
) -> DomainResult<MembershipRow> {
    let membership: Option<MembershipRow> = sqlx::query_as(
        "SELECT * FROM memberships WHERE user_id = ? AND household_id = ? AND is_active = 1",
    )
    .bind(user_id)
    .bind(household_id)
    .fetch_optional(pool)
    .await?;

    let membership = membership.ok_or(DomainError::AccessDenied)?;
    if required == Role::Admin && membership.role != "admin" {
        return Err(DomainError::AccessDenied);
    }
    Ok(membership)
}
