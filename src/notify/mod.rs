//! Push-notification collaborator. Delivery is owned by an external
//! service; the daemon calls it fire-and-forget after completions and
//! redemptions, off the transactional path.

use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn task_completed(&self, household_id: &str, user_id: &str, title: &str, points: i64);
    async fn reward_redeemed(&self, household_id: &str, user_id: &str, name: &str, cost: i64);
}

/// Default implementation: log and drop. Stands in for the external push
/// gateway in local deployments and tests.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn task_completed(&self, household_id: &str, user_id: &str, title: &str, points: i64) {
        debug!(
            household = household_id,
            user = user_id,
            title,
            points,
            "notify: task completed"
        );
    }

    async fn reward_redeemed(&self, household_id: &str, user_id: &str, name: &str, cost: i64) {
        debug!(
            household = household_id,
            user = user_id,
            name,
            cost,
            "notify: reward redeemed"
        );
    }
}
