//! Redemption Engine — affordability check and atomic debit + redemption
//! record. The debit and the record are one transaction: a failure after the
//! debit rolls the debit back.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::access::{self, Role};
use crate::error::{DomainError, DomainResult};
use crate::events::{DomainEvent, EventBroker};
use crate::ledger;
use crate::notify::Notifier;
use crate::storage::{new_id, now, RewardRow};
use crate::AppContext;

#[derive(Debug, Deserialize)]
pub struct CreateReward {
    pub name: String,
    #[serde(default)]
    pub cost: i64,
}

#[derive(Debug, Serialize)]
pub struct RedemptionOutcome {
    pub redemption_id: String,
    pub reward_id: String,
    pub new_balance: i64,
}

pub struct RewardEngine {
    pool: SqlitePool,
    broker: Arc<EventBroker>,
    notifier: Arc<dyn Notifier>,
}

impl RewardEngine {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            pool: ctx.storage.pool(),
            broker: Arc::clone(&ctx.broker),
            notifier: Arc::clone(&ctx.notifier),
        }
    }

    /// Admin-only reward creation.
    pub async fn create(
        &self,
        household_id: &str,
        acting_user: &str,
        req: CreateReward,
    ) -> DomainResult<RewardRow> {
        access::authorize(&self.pool, acting_user, household_id, Role::Admin).await?;

        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation(
                "empty_name",
                "reward name must not be empty",
            ));
        }
        if req.cost < 0 {
            return Err(DomainError::validation(
                "negative_cost",
                "reward cost must be >= 0",
            ));
        }

        let id = new_id();
        let created_at = now();
        sqlx::query(
            "INSERT INTO rewards (id, household_id, name, cost, is_available, created_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(&id)
        .bind(household_id)
        .bind(&name)
        .bind(req.cost)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(RewardRow {
            id,
            household_id: household_id.to_string(),
            name,
            cost: req.cost,
            is_available: true,
            created_at,
        })
    }

    /// Redeem a reward: debit the user's balance and create the redemption
    /// record in one atomic step. `InsufficientBalance` leaves everything
    /// untouched.
    pub async fn redeem(&self, reward_id: &str, acting_user: &str) -> DomainResult<RedemptionOutcome> {
        let reward: Option<RewardRow> = sqlx::query_as("SELECT * FROM rewards WHERE id = ?")
            .bind(reward_id)
            .fetch_optional(&self.pool)
            .await?;
        let reward = reward.ok_or(DomainError::NotFound { what: "reward" })?;
        if !reward.is_available {
            return Err(DomainError::conflict(
                "reward_unavailable",
                "reward is not available",
            ));
        }
        access::authorize(&self.pool, acting_user, &reward.household_id, Role::Member).await?;

        let redemption_id = new_id();
        let mut tx = self.pool.begin().await.map_err(DomainError::from)?;
        let new_balance = ledger::debit(
            &mut tx,
            acting_user,
            &reward.household_id,
            reward.cost,
            "reward_redeemed",
            Some(reward_id),
        )
        .await?;
        sqlx::query(
            "INSERT INTO redemptions (id, reward_id, user_id, cost, redeemed_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&redemption_id)
        .bind(reward_id)
        .bind(acting_user)
        .bind(reward.cost)
        .bind(now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await.map_err(DomainError::from)?;

        info!(
            reward = reward_id,
            user = acting_user,
            cost = reward.cost,
            balance = new_balance,
            "reward redeemed"
        );

        self.broker.publish(
            &reward.household_id,
            DomainEvent::RewardRedeemed {
                redemption_id: redemption_id.clone(),
                reward_id: reward_id.to_string(),
                household_id: reward.household_id.clone(),
                name: reward.name.clone(),
                user_id: acting_user.to_string(),
                cost: reward.cost,
                new_balance,
            },
        );

        let notifier = Arc::clone(&self.notifier);
        let (household, user, name, cost) = (
            reward.household_id.clone(),
            acting_user.to_string(),
            reward.name.clone(),
            reward.cost,
        );
        tokio::spawn(async move {
            notifier.reward_redeemed(&household, &user, &name, cost).await;
        });

        Ok(RedemptionOutcome {
            redemption_id,
            reward_id: reward_id.to_string(),
            new_balance,
        })
    }
}
