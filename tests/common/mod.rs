//! Shared test harness: a TempDir-backed daemon context plus seed helpers.

#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;

use hearthd::config::HearthConfig;
use hearthd::household::HouseholdEngine;
use hearthd::notify::LogNotifier;
use hearthd::storage::Storage;
use hearthd::AppContext;

pub struct TestApp {
    pub ctx: Arc<AppContext>,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = HearthConfig::new(None, Some(dir.path().to_path_buf()), None, None);
    let storage = Storage::new(dir.path()).await.unwrap();
    let ctx = Arc::new(AppContext::new(config, storage, Arc::new(LogNotifier)));
    TestApp { ctx, _dir: dir }
}

/// Create a household with `admin` as its admin plus the given members.
/// Returns the household id.
pub async fn seed_household(app: &TestApp, admin: &str, members: &[&str]) -> String {
    let engine = HouseholdEngine::new(&app.ctx.storage);
    let (household, _) = engine
        .create("Test Household", admin, Some(admin))
        .await
        .unwrap();
    for member in members {
        engine
            .join(&household.invite_code, member, Some(member))
            .await
            .unwrap();
    }
    household.id
}

pub async fn balance_of(app: &TestApp, user_id: &str) -> i64 {
    app.ctx
        .storage
        .get_user(user_id)
        .await
        .unwrap()
        .expect("user row")
        .points
}

pub async fn activity_sum(app: &TestApp, user_id: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(points_delta), 0) FROM activities WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(&app.ctx.storage.pool())
    .await
    .unwrap()
}

pub async fn activity_count(app: &TestApp, user_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&app.ctx.storage.pool())
        .await
        .unwrap()
}
