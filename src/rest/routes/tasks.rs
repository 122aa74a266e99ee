// rest/routes/tasks.rs — task lifecycle routes.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::DomainError;
use crate::rest::auth::Identity;
use crate::tasks::{CreateTask, TaskEngine, UpdateTask};
use crate::AppContext;

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let tasks = TaskEngine::new(&ctx)
        .list(&household_id, &identity.user_id)
        .await?;
    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(household_id): Path<String>,
    Json(body): Json<CreateTask>,
) -> Result<Json<Value>, DomainError> {
    let task = TaskEngine::new(&ctx)
        .create(&household_id, &identity.user_id, body)
        .await?;
    Ok(Json(serde_json::to_value(&task).map_err(anyhow::Error::from)?))
}

pub async fn complete(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let outcome = TaskEngine::new(&ctx)
        .complete(&task_id, &identity.user_id)
        .await?;
    Ok(Json(
        serde_json::to_value(&outcome).map_err(anyhow::Error::from)?,
    ))
}

pub async fn update(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(task_id): Path<String>,
    Json(body): Json<UpdateTask>,
) -> Result<Json<Value>, DomainError> {
    let task = TaskEngine::new(&ctx)
        .update(&task_id, &identity.user_id, body)
        .await?;
    Ok(Json(serde_json::to_value(&task).map_err(anyhow::Error::from)?))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

pub async fn comment(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    Path(task_id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<Value>, DomainError> {
    let comment = TaskEngine::new(&ctx)
        .comment(&task_id, &identity.user_id, &body.body)
        .await?;
    Ok(Json(
        serde_json::to_value(&comment).map_err(anyhow::Error::from)?,
    ))
}
