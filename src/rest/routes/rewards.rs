// rest/routes/rewards.rs — reward creation and redemption.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::DomainError;
use crate::rest::auth::Identity;
use crate::rewards::{CreateReward, RewardEngine};
use crate::AppContext;

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
    Json(body): Json<CreateReward>,
) -> Result<Json<Value>, DomainError> {
    let reward = RewardEngine::new(&ctx)
        .create(&household_id, &identity.user_id, body)
        .await?;
    Ok(Json(
        serde_json::to_value(&reward).map_err(anyhow::Error::from)?,
    ))
}

pub async fn redeem(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(reward_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let outcome = RewardEngine::new(&ctx)
        .redeem(&reward_id, &identity.user_id)
        .await?;
    Ok(Json(json!({
        "redemption_id": outcome.redemption_id,
        "reward_id": outcome.reward_id,
        "new_balance": outcome.new_balance,
    })))
}
