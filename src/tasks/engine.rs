//! Task Lifecycle Engine: create, complete (award + recurrence
//! regeneration), update, comment.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::access::{self, Role};
use crate::error::{DomainError, DomainResult};
use crate::events::{DomainEvent, EventBroker};
use crate::ledger;
use crate::notify::Notifier;
use crate::storage::{new_id, now, CommentRow, TaskRow};
use crate::AppContext;

use super::model::{CreateTask, Priority, Recurrence, UpdateTask};

#[derive(Debug, Serialize)]
pub struct CompletionOutcome {
    pub task: TaskRow,
    pub points_awarded: i64,
    pub new_balance: i64,
    pub streak_days: i64,
    /// Successor instance spawned for recurring tasks.
    pub successor: Option<TaskRow>,
}

pub struct TaskEngine {
    pool: SqlitePool,
    broker: Arc<EventBroker>,
    notifier: Arc<dyn Notifier>,
}

impl TaskEngine {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            pool: ctx.storage.pool(),
            broker: Arc::clone(&ctx.broker),
            notifier: Arc::clone(&ctx.notifier),
        }
    }

    pub async fn create(
        &self,
        household_id: &str,
        acting_user: &str,
        req: CreateTask,
    ) -> DomainResult<TaskRow> {
        access::authorize(&self.pool, acting_user, household_id, Role::Member).await?;

        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation(
                "empty_title",
                "task title must not be empty",
            ));
        }
        if req.points < 0 {
            return Err(DomainError::validation(
                "negative_points",
                "task points must be >= 0",
            ));
        }
        let priority = parse_priority(req.priority.as_deref())?;
        let recurrence = parse_recurrence(req.recurrence.as_deref())?;
        let due_at = req.due_at.as_deref().map(parse_timestamp).transpose()?;

        if let Some(assignee) = req.assigned_to.as_deref() {
            self.check_assignable(assignee, household_id).await?;
        }

        let id = new_id();
        sqlx::query(
            "INSERT INTO tasks (id, household_id, title, points, priority, recurrence,
                                created_by, assigned_to, due_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(household_id)
        .bind(&title)
        .bind(req.points)
        .bind(priority.as_str())
        .bind(recurrence.as_str())
        .bind(acting_user)
        .bind(req.assigned_to.as_deref())
        .bind(due_at.map(|t| t.to_rfc3339()))
        .bind(now())
        .execute(&self.pool)
        .await?;

        self.get(&id).await
    }

    /// Complete a task, credit the assignee, update their streak, and spawn
    /// the successor instance for recurring tasks, all in one transaction.
    /// A second completion attempt is a `Conflict`.
    pub async fn complete(
        &self,
        task_id: &str,
        acting_user: &str,
    ) -> DomainResult<CompletionOutcome> {
        let task = self.get(task_id).await?;
        let membership =
            access::authorize(&self.pool, acting_user, &task.household_id, Role::Member).await?;

        // Allowed: the assignee, anyone when unassigned (auto-assigns), or
        // an admin completing on a member's behalf.
        let is_admin = membership.role == "admin";
        match task.assigned_to.as_deref() {
            Some(assignee) if assignee != acting_user && !is_admin => {
                return Err(DomainError::AccessDenied);
            }
            _ => {}
        }
        let recipient = task.assigned_to.clone().unwrap_or_else(|| acting_user.to_string());

        let completed_at = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DomainError::from)?;

        let claimed = sqlx::query(
            "UPDATE tasks SET is_completed = 1, completed_at = ?, assigned_to = ?
             WHERE id = ? AND is_completed = 0",
        )
        .bind(completed_at.to_rfc3339())
        .bind(&recipient)
        .bind(task_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if claimed == 0 {
            return Err(DomainError::conflict(
                "already_completed",
                "task is already completed",
            ));
        }

        let new_balance = ledger::credit(
            &mut tx,
            &recipient,
            &task.household_id,
            task.points,
            "task_completed",
            Some(task_id),
        )
        .await?;
        let streak_days = ledger::record_completion_streak(&mut tx, &recipient, completed_at).await?;

        // Regeneration shares the completion transaction: a recurring task
        // is never left completed without its successor.
        let recurrence = Recurrence::parse(&task.recurrence)
            .ok_or(DomainError::Internal(anyhow::anyhow!(
                "corrupt recurrence value on task {task_id}"
            )))?;
        let successor_id = match recurrence {
            Recurrence::None => None,
            _ => {
                let base = match task.due_at.as_deref() {
                    Some(due) => parse_timestamp(due)?,
                    None => completed_at,
                };
                let next_due = recurrence
                    .next_due(base)
                    .ok_or(DomainError::Internal(anyhow::anyhow!(
                        "recurrence produced no successor date"
                    )))?;
                let id = new_id();
                sqlx::query(
                    "INSERT INTO tasks (id, household_id, title, points, priority, recurrence,
                                        created_by, assigned_to, due_at, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(&task.household_id)
                .bind(&task.title)
                .bind(task.points)
                .bind(&task.priority)
                .bind(&task.recurrence)
                .bind(&task.created_by)
                .bind(task.assigned_to.as_deref())
                .bind(next_due.to_rfc3339())
                .bind(now())
                .execute(&mut *tx)
                .await?;
                Some(id)
            }
        };

        tx.commit().await.map_err(DomainError::from)?;

        info!(
            task = task_id,
            user = %recipient,
            points = task.points,
            "task completed"
        );

        self.broker.publish(
            &task.household_id,
            DomainEvent::TaskCompleted {
                task_id: task_id.to_string(),
                household_id: task.household_id.clone(),
                title: task.title.clone(),
                user_id: recipient.clone(),
                points_awarded: task.points,
                new_balance,
                completed_at: completed_at.to_rfc3339(),
                successor_task_id: successor_id.clone(),
            },
        );

        // Out-of-band push delivery — never on the transactional path.
        let notifier = Arc::clone(&self.notifier);
        let (household, user, title, points) = (
            task.household_id.clone(),
            recipient.clone(),
            task.title.clone(),
            task.points,
        );
        tokio::spawn(async move {
            notifier.task_completed(&household, &user, &title, points).await;
        });

        let completed = self.get(task_id).await?;
        let successor = match successor_id {
            Some(id) => Some(self.get(&id).await?),
            None => None,
        };
        Ok(CompletionOutcome {
            points_awarded: completed.points,
            task: completed,
            new_balance,
            streak_days,
            successor,
        })
    }

    /// Apply a partial update. Only the creator or a household admin may
    /// update; one invalid field rejects the whole patch.
    pub async fn update(
        &self,
        task_id: &str,
        acting_user: &str,
        patch: UpdateTask,
    ) -> DomainResult<TaskRow> {
        let task = self.get(task_id).await?;
        let membership =
            access::authorize(&self.pool, acting_user, &task.household_id, Role::Member).await?;
        if task.created_by != acting_user && membership.role != "admin" {
            return Err(DomainError::AccessDenied);
        }

        let title = match patch.title {
            Some(t) => {
                let t = t.trim().to_string();
                if t.is_empty() {
                    return Err(DomainError::validation(
                        "empty_title",
                        "task title must not be empty",
                    ));
                }
                t
            }
            None => task.title,
        };
        let points = match patch.points {
            Some(p) if p < 0 => {
                return Err(DomainError::validation(
                    "negative_points",
                    "task points must be >= 0",
                ));
            }
            Some(p) => p,
            None => task.points,
        };
        let priority = match patch.priority.as_deref() {
            Some(p) => parse_priority(Some(p))?.as_str().to_string(),
            None => task.priority,
        };
        let recurrence = match patch.recurrence.as_deref() {
            Some(r) => parse_recurrence(Some(r))?.as_str().to_string(),
            None => task.recurrence,
        };
        let assigned_to = if patch.clear_assignee {
            None
        } else {
            match patch.assigned_to {
                Some(assignee) => {
                    self.check_assignable(&assignee, &task.household_id).await?;
                    Some(assignee)
                }
                None => task.assigned_to,
            }
        };
        let due_at = match patch.due_at.as_deref() {
            Some(d) => Some(parse_timestamp(d)?.to_rfc3339()),
            None => task.due_at,
        };

        sqlx::query(
            "UPDATE tasks SET title = ?, points = ?, priority = ?, recurrence = ?,
                              assigned_to = ?, due_at = ?
             WHERE id = ?",
        )
        .bind(&title)
        .bind(points)
        .bind(&priority)
        .bind(&recurrence)
        .bind(assigned_to.as_deref())
        .bind(due_at.as_deref())
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        self.get(task_id).await
    }

    /// Append a comment. Any active household member may comment on any task.
    pub async fn comment(
        &self,
        task_id: &str,
        acting_user: &str,
        body: &str,
    ) -> DomainResult<CommentRow> {
        let task = self.get(task_id).await?;
        access::authorize(&self.pool, acting_user, &task.household_id, Role::Member).await?;

        let body = body.trim();
        if body.is_empty() {
            return Err(DomainError::validation(
                "empty_comment",
                "comment body must not be empty",
            ));
        }

        let id = new_id();
        let created_at = now();
        sqlx::query(
            "INSERT INTO comments (id, task_id, author_id, body, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(task_id)
        .bind(acting_user)
        .bind(body)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(CommentRow {
            id,
            task_id: task_id.to_string(),
            author_id: acting_user.to_string(),
            body: body.to_string(),
            created_at,
        })
    }

    pub async fn list(&self, household_id: &str, acting_user: &str) -> DomainResult<Vec<TaskRow>> {
        access::authorize(&self.pool, acting_user, household_id, Role::Member).await?;
        Ok(sqlx::query_as(
            "SELECT * FROM tasks WHERE household_id = ? ORDER BY created_at DESC",
        )
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get(&self, id: &str) -> DomainResult<TaskRow> {
        let task: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        task.ok_or(DomainError::NotFound { what: "task" })
    }

    async fn check_assignable(&self, assignee: &str, household_id: &str) -> DomainResult<()> {
        let active: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM memberships WHERE user_id = ? AND household_id = ? AND is_active = 1",
        )
        .bind(assignee)
        .bind(household_id)
        .fetch_optional(&self.pool)
        .await?;
        if active.is_none() {
            return Err(DomainError::validation(
                "invalid_assignment",
                "assignee is not an active member of this household",
            ));
        }
        Ok(())
    }
}

fn parse_priority(s: Option<&str>) -> DomainResult<Priority> {
    match s {
        None => Ok(Priority::Medium),
        Some(raw) => Priority::parse(raw).ok_or_else(|| {
            DomainError::validation("invalid_priority", format!("unknown priority '{raw}'"))
        }),
    }
}

fn parse_recurrence(s: Option<&str>) -> DomainResult<Recurrence> {
    match s {
        None => Ok(Recurrence::None),
        Some(raw) => Recurrence::parse(raw).ok_or_else(|| {
            DomainError::validation("invalid_recurrence", format!("unknown recurrence '{raw}'"))
        }),
    }
}

fn parse_timestamp(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| DomainError::validation("invalid_timestamp", format!("'{s}' is not RFC 3339")))
}
