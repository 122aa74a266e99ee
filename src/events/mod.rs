//! Event Broker — per-household fan-out of domain events to live
//! subscriber connections.
//!
//! Publication sits outside the transactional core: engines publish after
//! their mutation has committed, delivery is best-effort, and a failed send
//! never surfaces to the request that triggered it. Dead connections are
//! pruned on send failure; the SSE layer's drop-guard deregisters promptly
//! when a client goes away.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::storage::new_feed_id;

/// Closed set of events a household stream can carry. The SSE keep-alive
/// `ping` is produced by the transport layer, not by this enum.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Hello {
        connection_id: String,
        reconnect_ms: u64,
    },
    TaskCompleted {
        task_id: String,
        household_id: String,
        title: String,
        user_id: String,
        points_awarded: i64,
        new_balance: i64,
        completed_at: String,
        successor_task_id: Option<String>,
    },
    ChallengeJoined {
        challenge_id: String,
        household_id: String,
        title: String,
        user_id: String,
        participant_count: i64,
    },
    RewardRedeemed {
        redemption_id: String,
        reward_id: String,
        household_id: String,
        name: String,
        user_id: String,
        cost: i64,
        new_balance: i64,
    },
}

impl DomainEvent {
    /// SSE `event:` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::Hello { .. } => "hello",
            DomainEvent::TaskCompleted { .. } => "task_completed",
            DomainEvent::ChallengeJoined { .. } => "challenge_joined",
            DomainEvent::RewardRedeemed { .. } => "reward_redeemed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("connection limit reached: {active} active streams for this user")]
    RateLimited { active: usize },
}

/// A registered stream connection handed to the SSE layer.
pub struct Subscription {
    pub connection_id: String,
    pub rx: mpsc::UnboundedReceiver<DomainEvent>,
}

struct Connection {
    user_id: String,
    tx: mpsc::UnboundedSender<DomainEvent>,
}

/// Per-household registry of subscriber connections keyed by connection id,
/// each tagged with the subscribing user.
pub struct EventBroker {
    max_per_user: usize,
    reconnect_ms: u64,
    households: Mutex<HashMap<String, HashMap<String, Connection>>>,
}

impl EventBroker {
    pub fn new(max_per_user: usize, reconnect_ms: u64) -> Self {
        Self {
            max_per_user,
            reconnect_ms,
            households: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection for `user_id` on a household stream.
    ///
    /// Rejects with `RateLimited` when the user already holds the maximum
    /// number of simultaneous connections for that household. On success the
    /// `hello` event (connection id + reconnect-interval hint) is already
    /// queued on the returned receiver.
    pub fn subscribe(
        &self,
        household_id: &str,
        user_id: &str,
    ) -> Result<Subscription, SubscribeError> {
        let mut households = self.households.lock().expect("broker lock poisoned");
        let connections = households.entry(household_id.to_string()).or_default();

        let active = connections
            .values()
            .filter(|c| c.user_id == user_id)
            .count();
        if active >= self.max_per_user {
            warn!(
                household = household_id,
                user = user_id,
                active,
                "subscription rejected"
            );
            return Err(SubscribeError::RateLimited { active });
        }

        let connection_id = new_feed_id();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(DomainEvent::Hello {
            connection_id: connection_id.clone(),
            reconnect_ms: self.reconnect_ms,
        });
        connections.insert(
            connection_id.clone(),
            Connection {
                user_id: user_id.to_string(),
                tx,
            },
        );
        debug!(
            household = household_id,
            user = user_id,
            connection = %connection_id,
            "stream subscribed"
        );
        Ok(Subscription { connection_id, rx })
    }

    /// Best-effort delivery to every registered connection of the household,
    /// in publish order. Connections whose receiver is gone are pruned.
    /// Never fails — event delivery is a side channel.
    pub fn publish(&self, household_id: &str, event: DomainEvent) {
        let mut households = self.households.lock().expect("broker lock poisoned");
        let Some(connections) = households.get_mut(household_id) else {
            return;
        };
        let before = connections.len();
        connections.retain(|_, c| c.tx.send(event.clone()).is_ok());
        let dropped = before - connections.len();
        if dropped > 0 {
            debug!(household = household_id, dropped, "pruned dead stream connections");
        }
        if connections.is_empty() {
            households.remove(household_id);
        }
    }

    /// Remove a connection. Idempotent — unknown ids are a no-op.
    pub fn unsubscribe(&self, household_id: &str, connection_id: &str) {
        let mut households = self.households.lock().expect("broker lock poisoned");
        if let Some(connections) = households.get_mut(household_id) {
            connections.remove(connection_id);
            if connections.is_empty() {
                households.remove(household_id);
            }
        }
    }

    /// Number of live connections on a household stream.
    pub fn connection_count(&self, household_id: &str) -> usize {
        self.households
            .lock()
            .expect("broker lock poisoned")
            .get(household_id)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}
