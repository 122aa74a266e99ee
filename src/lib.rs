pub mod access;
pub mod challenges;
pub mod config;
pub mod error;
pub mod events;
pub mod household;
pub mod ledger;
pub mod notify;
pub mod rest;
pub mod rewards;
pub mod storage;
pub mod tasks;

use std::sync::Arc;

use config::HearthConfig;
use events::EventBroker;
use notify::Notifier;
use storage::Storage;

/// Shared application state passed to every REST handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<HearthConfig>,
    pub storage: Arc<Storage>,
    pub broker: Arc<EventBroker>,
    /// Push-notification collaborator. Fire-and-forget — never on the
    /// transactional path.
    pub notifier: Arc<dyn Notifier>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(config: HearthConfig, storage: Storage, notifier: Arc<dyn Notifier>) -> Self {
        let broker = Arc::new(EventBroker::new(
            config.stream.max_streams_per_user,
            config.stream.reconnect_ms,
        ));
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            broker,
            notifier,
            started_at: std::time::Instant::now(),
        }
    }
}
