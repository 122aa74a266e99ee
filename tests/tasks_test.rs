//! Task Lifecycle Engine integration tests: creation validation, completion
//! semantics (award, streak, conflict, auto-assign), recurrence
//! regeneration, updates, and comments.

mod common;

use common::{activity_count, balance_of, seed_household, spawn_app};
use hearthd::error::DomainError;
use hearthd::tasks::{CreateTask, TaskEngine, UpdateTask};

fn new_task(title: &str, points: i64) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        points,
        priority: None,
        recurrence: None,
        assigned_to: None,
        due_at: None,
    }
}

// ─── Creation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_requires_membership() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let engine = TaskEngine::new(&app.ctx);

    let err = engine
        .create(&hh, "stranger", new_task("Dishes", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AccessDenied));
}

#[tokio::test]
async fn create_rejects_bad_fields() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let err = engine.create(&hh, "alice", new_task("   ", 5)).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { code: "empty_title", .. }));

    let err = engine.create(&hh, "alice", new_task("Dishes", -5)).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { code: "negative_points", .. }));

    let mut req = new_task("Dishes", 5);
    req.priority = Some("urgent".into());
    let err = engine.create(&hh, "alice", req).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { code: "invalid_priority", .. }));

    // Assignee outside the household.
    let mut req = new_task("Dishes", 5);
    req.assigned_to = Some("stranger".into());
    let err = engine.create(&hh, "alice", req).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { code: "invalid_assignment", .. }));
}

#[tokio::test]
async fn create_accepts_household_assignee() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Vacuum", 15);
    req.assigned_to = Some("bob".into());
    req.priority = Some("high".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();
    assert_eq!(task.assigned_to.as_deref(), Some("bob"));
    assert_eq!(task.priority, "high");
    assert!(!task.is_completed);
}

// ─── Completion ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn completion_awards_points_and_streak_once() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let engine = TaskEngine::new(&app.ctx);

    let task = engine.create(&hh, "alice", new_task("Dishes", 20)).await.unwrap();
    let outcome = engine.complete(&task.id, "alice").await.unwrap();

    assert_eq!(outcome.points_awarded, 20);
    assert_eq!(outcome.new_balance, 20);
    assert_eq!(outcome.streak_days, 1);
    assert!(outcome.task.is_completed);
    assert!(outcome.task.completed_at.is_some());
    assert!(outcome.successor.is_none());
    assert_eq!(balance_of(&app, "alice").await, 20);
    assert_eq!(activity_count(&app, "alice").await, 1);
}

#[tokio::test]
async fn unassigned_task_auto_assigns_to_completer() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let task = engine.create(&hh, "alice", new_task("Trash", 5)).await.unwrap();
    let outcome = engine.complete(&task.id, "bob").await.unwrap();

    assert_eq!(outcome.task.assigned_to.as_deref(), Some("bob"));
    assert_eq!(balance_of(&app, "bob").await, 5);
    assert_eq!(balance_of(&app, "alice").await, 0);
}

#[tokio::test]
async fn non_assignee_cannot_complete_someone_elses_task() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob", "carol"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Laundry", 10);
    req.assigned_to = Some("bob".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();

    let err = engine.complete(&task.id, "carol").await.unwrap_err();
    assert!(matches!(err, DomainError::AccessDenied));
}

#[tokio::test]
async fn admin_completion_awards_the_assignee() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Laundry", 10);
    req.assigned_to = Some("bob".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();

    // "alice" is the household admin; the award still goes to bob.
    engine.complete(&task.id, "alice").await.unwrap();
    assert_eq!(balance_of(&app, "bob").await, 10);
    assert_eq!(balance_of(&app, "alice").await, 0);
}

#[tokio::test]
async fn second_completion_is_a_conflict_not_a_double_award() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let engine = TaskEngine::new(&app.ctx);

    let task = engine.create(&hh, "alice", new_task("Dishes", 20)).await.unwrap();
    engine.complete(&task.id, "alice").await.unwrap();

    let err = engine.complete(&task.id, "alice").await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict { code: "already_completed", .. }));
    assert_eq!(balance_of(&app, "alice").await, 20);
    assert_eq!(activity_count(&app, "alice").await, 1);
}

#[tokio::test]
async fn concurrent_completion_yields_one_award_and_one_conflict() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine_a = TaskEngine::new(&app.ctx);
    let engine_b = TaskEngine::new(&app.ctx);

    let task = engine_a.create(&hh, "alice", new_task("Dishes", 20)).await.unwrap();

    let (a, b) = tokio::join!(
        engine_a.complete(&task.id, "alice"),
        engine_b.complete(&task.id, "bob"),
    );

    let oks = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(oks, 1, "exactly one completion must win");
    for result in [a, b] {
        if let Err(e) = result {
            assert!(matches!(e, DomainError::Conflict { .. }), "loser must see Conflict, got {e:?}");
        }
    }

    // Exactly one award across both users.
    let total = balance_of(&app, "alice").await + balance_of(&app, "bob").await;
    assert_eq!(total, 20);
}

// ─── Recurrence ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn daily_recurrence_spawns_successor_one_day_later() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Water plants", 5);
    req.recurrence = Some("daily".into());
    req.due_at = Some("2024-01-01T09:00:00+00:00".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();

    let outcome = engine.complete(&task.id, "alice").await.unwrap();
    let successor = outcome.successor.expect("daily task must regenerate");

    assert_eq!(successor.title, "Water plants");
    assert_eq!(successor.points, 5);
    assert_eq!(successor.recurrence, "daily");
    assert!(!successor.is_completed);
    assert!(successor.due_at.unwrap().starts_with("2024-01-02T09:00:00"));
    assert_ne!(successor.id, task.id);
}

#[tokio::test]
async fn weekly_and_monthly_recurrence_shift_accordingly() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Deep clean", 30);
    req.recurrence = Some("weekly".into());
    req.due_at = Some("2024-01-01T09:00:00+00:00".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();
    let successor = engine.complete(&task.id, "alice").await.unwrap().successor.unwrap();
    assert!(successor.due_at.unwrap().starts_with("2024-01-08T09:00:00"));

    let mut req = new_task("Pay rent", 0);
    req.recurrence = Some("monthly".into());
    req.due_at = Some("2024-01-31T12:00:00+00:00".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();
    let successor = engine.complete(&task.id, "alice").await.unwrap().successor.unwrap();
    // One calendar month, clamped to February's end.
    assert!(successor.due_at.unwrap().starts_with("2024-02-29T12:00:00"));
}

#[tokio::test]
async fn recurring_task_without_due_date_bases_successor_on_completion() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Tidy up", 5);
    req.recurrence = Some("daily".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();
    let outcome = engine.complete(&task.id, "alice").await.unwrap();

    let successor = outcome.successor.unwrap();
    let completed_at = outcome.task.completed_at.unwrap();
    let due = successor.due_at.unwrap();
    // Successor is due after the completion moment (one day later).
    assert!(due > completed_at);
}

#[tokio::test]
async fn successor_keeps_the_assignee_template() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Feed cat", 3);
    req.recurrence = Some("daily".into());
    req.assigned_to = Some("bob".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();

    let outcome = engine.complete(&task.id, "bob").await.unwrap();
    assert_eq!(outcome.successor.unwrap().assigned_to.as_deref(), Some("bob"));
}

// ─── Updates ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_creator_or_admin_may_update() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob", "carol"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let task = engine.create(&hh, "bob", new_task("Mop floor", 10)).await.unwrap();

    // Another plain member may not update.
    let patch = UpdateTask { title: Some("Mop everything".into()), ..Default::default() };
    let err = engine.update(&task.id, "carol", patch).await.unwrap_err();
    assert!(matches!(err, DomainError::AccessDenied));

    // The creator may.
    let patch = UpdateTask { title: Some("Mop everything".into()), ..Default::default() };
    let updated = engine.update(&task.id, "bob", patch).await.unwrap();
    assert_eq!(updated.title, "Mop everything");

    // The household admin may.
    let patch = UpdateTask { points: Some(12), ..Default::default() };
    let updated = engine.update(&task.id, "alice", patch).await.unwrap();
    assert_eq!(updated.points, 12);
}

#[tokio::test]
async fn one_bad_field_rejects_the_whole_update() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &[]).await;
    let engine = TaskEngine::new(&app.ctx);

    let task = engine.create(&hh, "alice", new_task("Mop floor", 10)).await.unwrap();

    let patch = UpdateTask {
        title: Some("Valid new title".into()),
        points: Some(-3),
        ..Default::default()
    };
    let err = engine.update(&task.id, "alice", patch).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { code: "negative_points", .. }));

    // Nothing was applied.
    let unchanged = engine.get(&task.id).await.unwrap();
    assert_eq!(unchanged.title, "Mop floor");
    assert_eq!(unchanged.points, 10);
}

#[tokio::test]
async fn update_can_clear_or_replace_the_assignee() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let mut req = new_task("Windows", 8);
    req.assigned_to = Some("bob".into());
    let task = engine.create(&hh, "alice", req).await.unwrap();

    let patch = UpdateTask { clear_assignee: true, ..Default::default() };
    let updated = engine.update(&task.id, "alice", patch).await.unwrap();
    assert!(updated.assigned_to.is_none());

    let patch = UpdateTask { assigned_to: Some("stranger".into()), ..Default::default() };
    let err = engine.update(&task.id, "alice", patch).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { code: "invalid_assignment", .. }));
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn any_member_may_comment_on_any_task() {
    let app = spawn_app().await;
    let hh = seed_household(&app, "alice", &["bob"]).await;
    let engine = TaskEngine::new(&app.ctx);

    let task = engine.create(&hh, "alice", new_task("Garden", 10)).await.unwrap();
    let comment = engine.comment(&task.id, "bob", "I can take this one").await.unwrap();
    assert_eq!(comment.author_id, "bob");
    assert_eq!(comment.body, "I can take this one");

    let err = engine.comment(&task.id, "bob", "   ").await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { code: "empty_comment", .. }));

    let err = engine.comment(&task.id, "stranger", "hi").await.unwrap_err();
    assert!(matches!(err, DomainError::AccessDenied));
}
