//! Challenge Engine — time-boxed group challenges and their rosters.
//! Progress is tracked only through the explicit participant roster; there
//! is no inference from task timestamps.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::access::{self, Role};
use crate::error::{DomainError, DomainResult};
use crate::events::{DomainEvent, EventBroker};
use crate::storage::{new_id, now, ChallengeRow};
use crate::AppContext;

#[derive(Debug, Deserialize)]
pub struct CreateChallenge {
    pub title: String,
    #[serde(default)]
    pub reward_points: i64,
    pub max_participants: Option<i64>,
    /// RFC 3339 timestamp.
    pub due_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinOutcome {
    pub challenge_id: String,
    pub participant_count: i64,
}

pub struct ChallengeEngine {
    pool: SqlitePool,
    broker: Arc<EventBroker>,
}

impl ChallengeEngine {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            pool: ctx.storage.pool(),
            broker: Arc::clone(&ctx.broker),
        }
    }

    /// Admin-only challenge creation.
    pub async fn create(
        &self,
        household_id: &str,
        acting_user: &str,
        req: CreateChallenge,
    ) -> DomainResult<ChallengeRow> {
        access::authorize(&self.pool, acting_user, household_id, Role::Admin).await?;

        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation(
                "empty_title",
                "challenge title must not be empty",
            ));
        }
        if req.reward_points < 0 {
            return Err(DomainError::validation(
                "negative_points",
                "challenge reward points must be >= 0",
            ));
        }
        if let Some(cap) = req.max_participants {
            if cap <= 0 {
                return Err(DomainError::validation(
                    "invalid_cap",
                    "participant cap must be > 0",
                ));
            }
        }
        let due_at = match req.due_at.as_deref() {
            Some(d) => Some(
                DateTime::parse_from_rfc3339(d)
                    .map_err(|_| {
                        DomainError::validation(
                            "invalid_timestamp",
                            format!("'{d}' is not RFC 3339"),
                        )
                    })?
                    .to_rfc3339(),
            ),
            None => None,
        };

        let id = new_id();
        let created_at = now();
        sqlx::query(
            "INSERT INTO challenges (id, household_id, title, reward_points, max_participants,
                                     due_at, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&id)
        .bind(household_id)
        .bind(&title)
        .bind(req.reward_points)
        .bind(req.max_participants)
        .bind(due_at.as_deref())
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(ChallengeRow {
            id,
            household_id: household_id.to_string(),
            title,
            reward_points: req.reward_points,
            max_participants: req.max_participants,
            due_at,
            is_active: true,
            created_at,
        })
    }

    /// Join a challenge. Duplicate joins and full rosters are conflicts;
    /// the roster insert and the cap check share one transaction.
    pub async fn join(&self, challenge_id: &str, acting_user: &str) -> DomainResult<JoinOutcome> {
        let challenge: Option<ChallengeRow> =
            sqlx::query_as("SELECT * FROM challenges WHERE id = ?")
                .bind(challenge_id)
                .fetch_optional(&self.pool)
                .await?;
        let challenge = challenge.ok_or(DomainError::NotFound { what: "challenge" })?;
        if !challenge.is_active {
            return Err(DomainError::conflict(
                "challenge_inactive",
                "challenge is no longer active",
            ));
        }
        access::authorize(&self.pool, acting_user, &challenge.household_id, Role::Member).await?;

        let mut tx = self.pool.begin().await.map_err(DomainError::from)?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO challenge_participants (challenge_id, user_id, joined_at)
             VALUES (?, ?, ?)",
        )
        .bind(challenge_id)
        .bind(acting_user)
        .bind(now())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Err(DomainError::conflict(
                "duplicate_join",
                "user already joined this challenge",
            ));
        }

        let participant_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM challenge_participants WHERE challenge_id = ?",
        )
        .bind(challenge_id)
        .fetch_one(&mut *tx)
        .await?;
        if let Some(cap) = challenge.max_participants {
            if participant_count > cap {
                // Dropping the transaction rolls the insert back.
                return Err(DomainError::conflict(
                    "challenge_full",
                    "challenge participant cap reached",
                ));
            }
        }

        tx.commit().await.map_err(DomainError::from)?;

        info!(
            challenge = challenge_id,
            user = acting_user,
            participants = participant_count,
            "challenge joined"
        );

        self.broker.publish(
            &challenge.household_id,
            DomainEvent::ChallengeJoined {
                challenge_id: challenge_id.to_string(),
                household_id: challenge.household_id.clone(),
                title: challenge.title.clone(),
                user_id: acting_user.to_string(),
                participant_count,
            },
        );

        Ok(JoinOutcome {
            challenge_id: challenge_id.to_string(),
            participant_count,
        })
    }
}
