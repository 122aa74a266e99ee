//! Households and memberships: create, join-by-code, leave, and the
//! read-side projections (summary, leaderboard, activity feed) clients use
//! to catch up after missed stream events.

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::access::{self, Role};
use crate::error::{DomainError, DomainResult};
use crate::storage::{
    new_id, now, ActivityRow, ChallengeRow, HouseholdRow, MembershipRow, RewardRow, Storage,
    TaskRow,
};

const ACTIVITY_FEED_LIMIT: i64 = 50;
const SUMMARY_TASK_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct MemberEntry {
    pub user_id: String,
    pub display_name: String,
    pub role: String,
    pub points: i64,
    pub streak_days: i64,
}

#[derive(Debug, Serialize)]
pub struct ChallengeEntry {
    #[serde(flatten)]
    pub challenge: ChallengeRow,
    pub participant_count: i64,
}

/// Full household state fetch — the catch-up call for clients that missed
/// stream events.
#[derive(Debug, Serialize)]
pub struct HouseholdSummary {
    pub household: HouseholdRow,
    pub members: Vec<MemberEntry>,
    pub tasks: Vec<TaskRow>,
    pub rewards: Vec<RewardRow>,
    pub challenges: Vec<ChallengeEntry>,
}

pub struct HouseholdEngine<'a> {
    storage: &'a Storage,
    pool: SqlitePool,
}

impl<'a> HouseholdEngine<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            pool: storage.pool(),
        }
    }

    /// Create a household; the creator becomes its first admin member.
    pub async fn create(
        &self,
        name: &str,
        creator_id: &str,
        creator_name: Option<&str>,
    ) -> DomainResult<(HouseholdRow, MembershipRow)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation(
                "empty_name",
                "household name must not be empty",
            ));
        }
        self.storage.ensure_user(creator_id, creator_name).await?;

        let id = new_id();
        sqlx::query(
            "INSERT INTO households (id, name, invite_code, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(new_invite_code())
        .bind(now())
        .execute(&self.pool)
        .await?;

        let membership = self.insert_membership(creator_id, &id, Role::Admin).await?;
        let household = self.get(&id).await?;
        Ok((household, membership))
    }

    /// Join a household by invite code. Rejoining after a leave reactivates
    /// the old membership so historical activity keeps its attribution.
    pub async fn join(
        &self,
        invite_code: &str,
        user_id: &str,
        user_name: Option<&str>,
    ) -> DomainResult<(HouseholdRow, MembershipRow)> {
        let household: Option<HouseholdRow> =
            sqlx::query_as("SELECT * FROM households WHERE invite_code = ?")
                .bind(invite_code.trim())
                .fetch_optional(&self.pool)
                .await?;
        let household = household.ok_or(DomainError::NotFound { what: "household" })?;

        self.storage.ensure_user(user_id, user_name).await?;

        let existing: Option<MembershipRow> =
            sqlx::query_as("SELECT * FROM memberships WHERE user_id = ? AND household_id = ?")
                .bind(user_id)
                .bind(&household.id)
                .fetch_optional(&self.pool)
                .await?;

        let membership = match existing {
            Some(m) if m.is_active => {
                return Err(DomainError::conflict(
                    "already_member",
                    "user is already a member of this household",
                ));
            }
            Some(m) => {
                sqlx::query("UPDATE memberships SET is_active = 1 WHERE id = ?")
                    .bind(&m.id)
                    .execute(&self.pool)
                    .await?;
                MembershipRow {
                    is_active: true,
                    ..m
                }
            }
            None => {
                self.insert_membership(user_id, &household.id, Role::Member)
                    .await?
            }
        };

        Ok((household, membership))
    }

    /// Deactivate the acting user's membership. The row stays so past
    /// activity remains attributed.
    pub async fn leave(&self, household_id: &str, user_id: &str) -> DomainResult<()> {
        let membership = access::authorize(&self.pool, user_id, household_id, Role::Member).await?;
        sqlx::query("UPDATE memberships SET is_active = 0 WHERE id = ?")
            .bind(&membership.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn summary(
        &self,
        household_id: &str,
        acting_user: &str,
    ) -> DomainResult<HouseholdSummary> {
        access::authorize(&self.pool, acting_user, household_id, Role::Member).await?;
        let household = self.get(household_id).await?;

        let members = self.members(household_id).await?;

        let tasks: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE household_id = ? ORDER BY is_completed ASC, created_at DESC LIMIT ?",
        )
        .bind(household_id)
        .bind(SUMMARY_TASK_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let rewards: Vec<RewardRow> = sqlx::query_as(
            "SELECT * FROM rewards WHERE household_id = ? AND is_available = 1 ORDER BY cost ASC",
        )
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;

        let challenge_rows: Vec<ChallengeRow> = sqlx::query_as(
            "SELECT * FROM challenges WHERE household_id = ? AND is_active = 1 ORDER BY created_at DESC",
        )
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;
        let mut challenges = Vec::with_capacity(challenge_rows.len());
        for challenge in challenge_rows {
            let participant_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM challenge_participants WHERE challenge_id = ?",
            )
            .bind(&challenge.id)
            .fetch_one(&self.pool)
            .await?;
            challenges.push(ChallengeEntry {
                challenge,
                participant_count,
            });
        }

        Ok(HouseholdSummary {
            household,
            members,
            tasks,
            rewards,
            challenges,
        })
    }

    /// Members ranked by points, highest first.
    pub async fn leaderboard(
        &self,
        household_id: &str,
        acting_user: &str,
    ) -> DomainResult<Vec<MemberEntry>> {
        access::authorize(&self.pool, acting_user, household_id, Role::Member).await?;
        let mut members = self.members(household_id).await?;
        members.sort_by(|a, b| b.points.cmp(&a.points));
        Ok(members)
    }

    /// Recent audit-ledger entries, newest first.
    pub async fn activity(
        &self,
        household_id: &str,
        acting_user: &str,
    ) -> DomainResult<Vec<ActivityRow>> {
        access::authorize(&self.pool, acting_user, household_id, Role::Member).await?;
        Ok(sqlx::query_as(
            "SELECT * FROM activities WHERE household_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(household_id)
        .bind(ACTIVITY_FEED_LIMIT)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get(&self, id: &str) -> DomainResult<HouseholdRow> {
        let household: Option<HouseholdRow> =
            sqlx::query_as("SELECT * FROM households WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        household.ok_or(DomainError::NotFound { what: "household" })
    }

    async fn members(&self, household_id: &str) -> DomainResult<Vec<MemberEntry>> {
        let rows: Vec<(String, String, String, i64, i64)> = sqlx::query_as(
            "SELECT u.id, u.display_name, m.role, u.points, u.streak_days
               FROM memberships m JOIN users u ON u.id = m.user_id
              WHERE m.household_id = ? AND m.is_active = 1
           ORDER BY u.points DESC",
        )
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(
                |(user_id, display_name, role, points, streak_days)| MemberEntry {
                    user_id,
                    display_name,
                    role,
                    points,
                    streak_days,
                },
            )
            .collect())
    }

    async fn insert_membership(
        &self,
        user_id: &str,
        household_id: &str,
        role: Role,
    ) -> DomainResult<MembershipRow> {
        let id = new_id();
        let joined_at = now();
        sqlx::query(
            "INSERT INTO memberships (id, user_id, household_id, role, is_active, joined_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(household_id)
        .bind(role.as_str())
        .bind(&joined_at)
        .execute(&self.pool)
        .await?;
        Ok(MembershipRow {
            id,
            user_id: user_id.to_string(),
            household_id: household_id.to_string(),
            role: role.as_str().to_string(),
            is_active: true,
            joined_at,
        })
    }
}

/// Short, human-shareable invite code.
fn new_invite_code() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw.chars().take(8).collect::<String>().to_uppercase()
}
