//! Points Ledger — the only code that mutates balances and streaks.
//!
//! Every balance change is a guarded UPDATE plus exactly one `activities`
//! row, executed on the caller's connection so engines can fold ledger
//! writes into their own transaction. The guard (`points >= amount` inside
//! the UPDATE itself) is what serializes concurrent debits against the same
//! user: the check and the write are one statement, and SQLite runs one
//! writer at a time.

use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DomainError, DomainResult};
use crate::storage::{new_feed_id, now};

/// Add `amount` points to a user's balance and record the matching activity.
/// Returns the updated balance. Never fails for a valid user and amount ≥ 0.
pub async fn credit(
    conn: &mut SqliteConnection,
    user_id: &str,
    household_id: &str,
    amount: i64,
    kind: &str,
    ref_id: Option<&str>,
) -> DomainResult<i64> {
    if amount < 0 {
        return Err(DomainError::validation(
            "negative_amount",
            "credit amount must be >= 0",
        ));
    }

    let affected = sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
        .bind(amount)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(DomainError::NotFound { what: "user" });
    }

    write_activity(conn, household_id, user_id, kind, amount, ref_id).await?;

    let balance = fetch_balance(conn, user_id).await?;
    debug!(user = user_id, amount, balance, kind, "credit");
    Ok(balance)
}

/// Remove `amount` points from a user's balance, rejecting the debit when it
/// would drive the balance negative. On rejection nothing is written — no
/// balance change and no activity row.
pub async fn debit(
    conn: &mut SqliteConnection,
    user_id: &str,
    household_id: &str,
    amount: i64,
    kind: &str,
    ref_id: Option<&str>,
) -> DomainResult<i64> {
    if amount < 0 {
        return Err(DomainError::validation(
            "negative_amount",
            "debit amount must be >= 0",
        ));
    }

    // The balance check and the decrement are one guarded statement, so two
    // racing debits cannot both observe the pre-debit balance.
    let affected =
        sqlx::query("UPDATE users SET points = points - ? WHERE id = ? AND points >= ?")
            .bind(amount)
            .bind(user_id)
            .bind(amount)
            .execute(&mut *conn)
            .await?
            .rows_affected();

    if affected == 0 {
        let balance = fetch_balance(conn, user_id).await?;
        return Err(DomainError::InsufficientBalance {
            balance,
            required: amount,
        });
    }

    write_activity(conn, household_id, user_id, kind, -amount, ref_id).await?;

    let balance = fetch_balance(conn, user_id).await?;
    debug!(user = user_id, amount, balance, kind, "debit");
    Ok(balance)
}

/// Update a user's consecutive-day completion streak for a completion at
/// `completed_at`. Returns the streak after the update.
///
/// Same calendar day as the last counted completion: unchanged. Exactly the
/// next day: +1. Any gap, or no prior completion: reset to 1.
pub async fn record_completion_streak(
    conn: &mut SqliteConnection,
    user_id: &str,
    completed_at: DateTime<Utc>,
) -> DomainResult<i64> {
    let day = completed_at.date_naive();

    let row: Option<(Option<String>, i64)> =
        sqlx::query_as("SELECT last_completion_day, streak_days FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    let (last_day, streak) = row.ok_or(DomainError::NotFound { what: "user" })?;

    let last_day = last_day.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
    let next = streak_after(last_day, streak, day);
    if next != streak || last_day != Some(day) {
        sqlx::query("UPDATE users SET streak_days = ?, last_completion_day = ? WHERE id = ?")
            .bind(next)
            .bind(day.format("%Y-%m-%d").to_string())
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(next)
}

/// Pure streak transition. Kept separate from the storage write so the
/// calendar edge cases are directly testable.
fn streak_after(last_day: Option<NaiveDate>, streak: i64, day: NaiveDate) -> i64 {
    match last_day {
        Some(last) if last == day => streak.max(1),
        Some(last) if last.checked_add_days(Days::new(1)) == Some(day) => streak + 1,
        _ => 1,
    }
}

/// Standalone credit that opens its own transaction.
pub async fn credit_user(
    pool: &SqlitePool,
    user_id: &str,
    household_id: &str,
    amount: i64,
    kind: &str,
    ref_id: Option<&str>,
) -> DomainResult<i64> {
    let mut tx = pool.begin().await.map_err(DomainError::from)?;
    let balance = credit(&mut tx, user_id, household_id, amount, kind, ref_id).await?;
    tx.commit().await.map_err(DomainError::from)?;
    Ok(balance)
}

/// Standalone debit that opens its own transaction.
pub async fn debit_user(
    pool: &SqlitePool,
    user_id: &str,
    household_id: &str,
    amount: i64,
    kind: &str,
    ref_id: Option<&str>,
) -> DomainResult<i64> {
    let mut tx = pool.begin().await.map_err(DomainError::from)?;
    let balance = debit(&mut tx, user_id, household_id, amount, kind, ref_id).await?;
    tx.commit().await.map_err(DomainError::from)?;
    Ok(balance)
}

async fn fetch_balance(conn: &mut SqliteConnection, user_id: &str) -> DomainResult<i64> {
    let balance: Option<i64> = sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    balance.ok_or(DomainError::NotFound { what: "user" })
}

async fn write_activity(
    conn: &mut SqliteConnection,
    household_id: &str,
    user_id: &str,
    kind: &str,
    points_delta: i64,
    ref_id: Option<&str>,
) -> DomainResult<()> {
    sqlx::query(
        "INSERT INTO activities (id, household_id, user_id, kind, points_delta, ref_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new_feed_id())
    .bind(household_id)
    .bind(user_id)
    .bind(kind)
    .bind(points_delta)
    .bind(ref_id)
    .bind(now())
    .execute(conn)
    .await?;
    Ok(())
}
