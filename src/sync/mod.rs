pub mod engine;
pub mod state;

pub use engine::{CallSource, CallWriter, SyncConfig, SyncEngine, SyncReport};
pub use state::{JsonStateStore, StateStore, SyncState};
