pub mod engine;
pub mod model;

pub use engine::{CompletionOutcome, TaskEngine};
pub use model::{CreateTask, Priority, Recurrence, UpdateTask};
