// rest/routes/households.rs — household lifecycle and read-side projections.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::DomainError;
use crate::household::HouseholdEngine;
use crate::rest::auth::Identity;
use crate::AppContext;

#[derive(Deserialize)]
pub struct CreateHouseholdRequest {
    pub name: String,
}

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Json(body): Json<CreateHouseholdRequest>,
) -> Result<Json<Value>, DomainError> {
    let engine = HouseholdEngine::new(&ctx.storage);
    let (household, membership) = engine
        .create(&body.name, &identity.user_id, identity.display_name.as_deref())
        .await?;
    Ok(Json(json!({
        "household": household,
        "membership": membership,
    })))
}

#[derive(Deserialize)]
pub struct JoinHouseholdRequest {
    pub invite_code: String,
}

pub async fn join(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Json(body): Json<JoinHouseholdRequest>,
) -> Result<Json<Value>, DomainError> {
    let engine = HouseholdEngine::new(&ctx.storage);
    let (household, membership) = engine
        .join(
            &body.invite_code,
            &identity.user_id,
            identity.display_name.as_deref(),
        )
        .await?;
    Ok(Json(json!({
        "household": household,
        "membership": membership,
    })))
}

pub async fn leave(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    HouseholdEngine::new(&ctx.storage)
        .leave(&household_id, &identity.user_id)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn summary(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let summary = HouseholdEngine::new(&ctx.storage)
        .summary(&household_id, &identity.user_id)
        .await?;
    Ok(Json(serde_json::to_value(&summary).map_err(anyhow::Error::from)?))
}

pub async fn leaderboard(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let entries = HouseholdEngine::new(&ctx.storage)
        .leaderboard(&household_id, &identity.user_id)
        .await?;
    Ok(Json(json!({ "leaderboard": entries })))
}

pub async fn activity(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let entries = HouseholdEngine::new(&ctx.storage)
        .activity(&household_id, &identity.user_id)
        .await?;
    Ok(Json(json!({ "activity": entries })))
}
