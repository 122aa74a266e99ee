//! Redemption Engine integration tests: atomic debit + record, affordability
//! rejection, and the end-to-end earn-then-spend scenario.

mod common;

use common::{activity_count, activity_sum, balance_of, seed_household, spawn_app};
use hearthd::error::DomainError;
use hearthd::ledger;
use hearthd::rewards::{CreateReward, RewardEngine};
use hearthd::tasks::{CreateTask, TaskEngine};

async fn redemption_count(app: &common::TestApp, user: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM redemptions WHERE user_id = ?")
        .bind(user)
        .fetch_one(&app.ctx.storage.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn reward_creation_is_admin_only() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = RewardEngine::new(&app.ctx);

    let err = engine
        .create(&hh, "bob", CreateReward { name: "Movie night".into(), cost: 10 })
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AccessDenied));

    let reward = engine
        .create(&hh, "alice", CreateReward { name: "Movie night".into(), cost: 10 })
        .await
        .unwrap();
    assert!(reward.is_available);
    assert_eq!(reward.cost, 10);
}

#[tokio::test]
async fn redeem_debits_and_records_atomically() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    ledger::credit_user(&app.ctx.storage.pool(), "bob", &hh, 50, "task_completed", None)
        .await
        .unwrap();

    let reward = RewardEngine::new(&app.ctx)
        .create(&hh, "alice", CreateReward { name: "Sleep in".into(), cost: 20 })
        .await
        .unwrap();

    let outcome = RewardEngine::new(&app.ctx).redeem(&reward.id, "bob").await.unwrap();
    assert_eq!(outcome.new_balance, 30);
    assert_eq!(balance_of(&app, "bob").await, 30);
    assert_eq!(redemption_count(&app, "bob").await, 1);
    // Debit activity entry matches the redemption.
    assert_eq!(activity_sum(&app, "bob").await, 30);
}

#[tokio::test]
async fn unaffordable_redemption_changes_nothing() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    ledger::credit_user(&app.ctx.storage.pool(), "bob", &hh, 5, "task_completed", None)
        .await
        .unwrap();

    let reward = RewardEngine::new(&app.ctx)
        .create(&hh, "alice", CreateReward { name: "Takeout".into(), cost: 15 })
        .await
        .unwrap();

    let err = RewardEngine::new(&app.ctx).redeem(&reward.id, "bob").await.unwrap_err();
    match err {
        DomainError::InsufficientBalance { balance, required } => {
            assert_eq!(balance, 5);
            assert_eq!(required, 15);
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
    assert_eq!(balance_of(&app, "bob").await, 5);
    assert_eq!(redemption_count(&app, "bob").await, 0);
    assert_eq!(activity_count(&app, "bob").await, 1); // only the seed credit
}

#[tokio::test]
async fn redeeming_requires_membership_and_availability() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let reward = RewardEngine::new(&app.ctx)
        .create(&hh, "alice", CreateReward { name: "Day off".into(), cost: 0 })
        .await
        .unwrap();

    let err = RewardEngine::new(&app.ctx).redeem(&reward.id, "stranger").await.unwrap_err();
    assert!(matches!(err, DomainError::AccessDenied));

    let err = RewardEngine::new(&app.ctx).redeem("no-such-reward", "alice").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));

    sqlx::query("UPDATE rewards SET is_available = 0 WHERE id = ?")
        .bind(&reward.id)
        .execute(&app.ctx.storage.pool())
        .await
        .unwrap();
    let err = RewardEngine::new(&app.ctx).redeem(&reward.id, "alice").await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict { code: "reward_unavailable", .. }));
}

#[tokio::test]
async fn concurrent_redemptions_cannot_overspend() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    ledger::credit_user(&app.ctx.storage.pool(), "bob", &hh, 20, "task_completed", None)
        .await
        .unwrap();

    let reward = RewardEngine::new(&app.ctx)
        .create(&hh, "alice", CreateReward { name: "Pizza".into(), cost: 15 })
        .await
        .unwrap();

    let engine_a = RewardEngine::new(&app.ctx);
    let engine_b = RewardEngine::new(&app.ctx);
    let (a, b) = tokio::join!(
        engine_a.redeem(&reward.id, "bob"),
        engine_b.redeem(&reward.id, "bob"),
    );

    let oks = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(oks, 1, "only one redemption can afford the cost");
    assert_eq!(balance_of(&app, "bob").await, 5);
    assert_eq!(redemption_count(&app, "bob").await, 1);
}

/// End-to-end scenario: earn 20, spend 15, fail to spend 15 again.
#[tokio::test]
async fn earn_then_spend_scenario() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;

    // Complete a 20-point task: balance 20, one credit entry, streak 1.
    let task = TaskEngine::new(&app.ctx)
        .create(
            &hh,
            "alice",
            CreateTask {
                title: "Clean kitchen".into(),
                points: 20,
                priority: None,
                recurrence: None,
                assigned_to: None,
                due_at: None,
            },
        )
        .await
        .unwrap();
    let outcome = TaskEngine::new(&app.ctx).complete(&task.id, "alice").await.unwrap();
    assert_eq!(outcome.new_balance, 20);
    assert_eq!(outcome.streak_days, 1);
    assert_eq!(activity_count(&app, "alice").await, 1);

    // Redeem a 15-point reward: balance 5, one redemption, one debit entry.
    let reward = RewardEngine::new(&app.ctx)
        .create(&hh, "alice", CreateReward { name: "Choose dinner".into(), cost: 15 })
        .await
        .unwrap();
    let outcome = RewardEngine::new(&app.ctx).redeem(&reward.id, "alice").await.unwrap();
    assert_eq!(outcome.new_balance, 5);
    assert_eq!(redemption_count(&app, "alice").await, 1);
    assert_eq!(activity_count(&app, "alice").await, 2);

    // A second identical redemption is rejected and changes nothing.
    let err = RewardEngine::new(&app.ctx).redeem(&reward.id, "alice").await.unwrap_err();
    match err {
        DomainError::InsufficientBalance { balance, required } => {
            assert_eq!(balance, 5);
            assert_eq!(required, 15);
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
    assert_eq!(balance_of(&app, "alice").await, 5);
    assert_eq!(redemption_count(&app, "alice").await, 1);
}
