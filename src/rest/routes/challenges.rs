// rest/routes/challenges.rs — challenge creation and roster joins.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::challenges::{ChallengeEngine, CreateChallenge};
use crate::error::DomainError;
use crate::rest::auth::Identity;
use crate::AppContext;

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
    Json(body): Json<CreateChallenge>,
) -> Result<Json<Value>, DomainError> {
    let challenge = ChallengeEngine::new(&ctx)
        .create(&household_id, &identity.user_id, body)
        .await?;
    Ok(Json(
        serde_json::to_value(&challenge).map_err(anyhow::Error::from)?,
    ))
}

pub async fn join(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(challenge_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let outcome = ChallengeEngine::new(&ctx)
        .join(&challenge_id, &identity.user_id)
        .await?;
    Ok(Json(json!({
        "challenge_id": outcome.challenge_id,
        "participant_count": outcome.participant_count,
    })))
}
