use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Generate a new entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new lexicographically sortable id for feed rows (activities,
/// stream connections).
pub fn new_feed_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Current timestamp in the canonical storage format (RFC 3339, UTC).
pub fn now() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct UserRow {
    pub id: String,
    pub display_name: String,
    pub points: i64,
    pub streak_days: i64,
    /// ISO date ("YYYY-MM-DD") of the most recent completion counted toward
    /// the streak. NULL until the first completion.
    pub last_completion_day: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct HouseholdRow {
    pub id: String,
    pub name: String,
    pub invite_code: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct MembershipRow {
    pub id: String,
    pub user_id: String,
    pub household_id: String,
    /// "member" | "admin"
    pub role: String,
    /// Soft-deactivated rather than deleted so historical activity keeps
    /// its attribution.
    pub is_active: bool,
    pub joined_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct TaskRow {
    pub id: String,
    pub household_id: String,
    pub title: String,
    pub points: i64,
    pub priority: String,
    pub recurrence: String,
    pub created_by: String,
    pub assigned_to: Option<String>,
    pub due_at: Option<String>,
    pub is_completed: bool,
    pub completed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CommentRow {
    pub id: String,
    pub task_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RewardRow {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub cost: i64,
    pub is_available: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RedemptionRow {
    pub id: String,
    pub reward_id: String,
    pub user_id: String,
    /// Cost at redemption time — reward prices can change later.
    pub cost: i64,
    pub redeemed_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ChallengeRow {
    pub id: String,
    pub household_id: String,
    pub title: String,
    pub reward_points: i64,
    pub max_participants: Option<i64>,
    pub due_at: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

/// Append-only audit ledger entry. Every point-balance change writes exactly
/// one of these; balances can be reconstructed from the deltas.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ActivityRow {
    pub id: String,
    pub household_id: String,
    pub user_id: String,
    pub kind: String,
    pub points_delta: i64,
    pub ref_id: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("hearthd.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::bootstrap(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Idempotent schema bootstrap. Every statement is `IF NOT EXISTS`, so
    /// this runs on every startup against new and existing databases alike.
    async fn bootstrap(pool: &SqlitePool) -> Result<()> {
        let stmts = [
            "CREATE TABLE IF NOT EXISTS users (
                id                  TEXT PRIMARY KEY,
                display_name        TEXT NOT NULL,
                points              INTEGER NOT NULL DEFAULT 0,
                streak_days         INTEGER NOT NULL DEFAULT 0,
                last_completion_day TEXT,
                created_at          TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS households (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                invite_code TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS memberships (
                id           TEXT PRIMARY KEY,
                user_id      TEXT NOT NULL,
                household_id TEXT NOT NULL,
                role         TEXT NOT NULL DEFAULT 'member',
                is_active    INTEGER NOT NULL DEFAULT 1,
                joined_at    TEXT NOT NULL,
                UNIQUE(user_id, household_id)
            )",
            "CREATE TABLE IF NOT EXISTS tasks (
                id           TEXT PRIMARY KEY,
                household_id TEXT NOT NULL,
                title        TEXT NOT NULL,
                points       INTEGER NOT NULL DEFAULT 0,
                priority     TEXT NOT NULL DEFAULT 'medium',
                recurrence   TEXT NOT NULL DEFAULT 'none',
                created_by   TEXT NOT NULL,
                assigned_to  TEXT,
                due_at       TEXT,
                is_completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                created_at   TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS comments (
                id         TEXT PRIMARY KEY,
                task_id    TEXT NOT NULL,
                author_id  TEXT NOT NULL,
                body       TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS rewards (
                id           TEXT PRIMARY KEY,
                household_id TEXT NOT NULL,
                name         TEXT NOT NULL,
                cost         INTEGER NOT NULL DEFAULT 0,
                is_available INTEGER NOT NULL DEFAULT 1,
                created_at   TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS redemptions (
                id          TEXT PRIMARY KEY,
                reward_id   TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                cost        INTEGER NOT NULL,
                redeemed_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS challenges (
                id               TEXT PRIMARY KEY,
                household_id     TEXT NOT NULL,
                title            TEXT NOT NULL,
                reward_points    INTEGER NOT NULL DEFAULT 0,
                max_participants INTEGER,
                due_at           TEXT,
                is_active        INTEGER NOT NULL DEFAULT 1,
                created_at       TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS challenge_participants (
                challenge_id TEXT NOT NULL,
                user_id      TEXT NOT NULL,
                joined_at    TEXT NOT NULL,
                PRIMARY KEY (challenge_id, user_id)
            )",
            "CREATE TABLE IF NOT EXISTS activities (
                id           TEXT PRIMARY KEY,
                household_id TEXT NOT NULL,
                user_id      TEXT NOT NULL,
                kind         TEXT NOT NULL,
                points_delta INTEGER NOT NULL DEFAULT 0,
                ref_id       TEXT,
                created_at   TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_memberships_household
                ON memberships (household_id, is_active)",
            "CREATE INDEX IF NOT EXISTS idx_tasks_household
                ON tasks (household_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_comments_task
                ON comments (task_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_activities_household
                ON activities (household_id, created_at)",
        ];
        for stmt in stmts {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .context("schema bootstrap")?;
        }
        Ok(())
    }

    /// Fetch a user row by id.
    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Insert the user row for a verified identity on first sight.
    ///
    /// Identity issuance lives outside this daemon; the transport hands us a
    /// verified user id (and optionally a display name) and we mirror it here
    /// so the ledger has a balance row to mutate.
    pub async fn ensure_user(&self, id: &str, display_name: Option<&str>) -> Result<UserRow> {
        let name = display_name.unwrap_or(id);
        sqlx::query(
            "INSERT INTO users (id, display_name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(id)
        .bind(name)
        .bind(now())
        .execute(&self.pool)
        .await?;
        self.get_user(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user not found after insert"))
    }
}
