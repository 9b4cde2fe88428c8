//! Action log management for Recorder Studio.
//!
//! - [`ActionLog`]: the ordered, mutable list of recorded actions
//! - [`RecordBook`]: named snapshots with overwrite confirmation
//! - [`KeyValueStore`]: JSON persistence backends
//! - [`PersistHandle`]: fire-and-forget background writer

pub mod errors;
pub mod log;
pub mod persist;
pub mod records;
pub mod store;

pub use errors::{LogError, RecordError, StoreError};
pub use log::{parse_actions, ActionLog, LogMeta, ACTIONS_KEY, SESSION_KEY};
pub use persist::PersistHandle;
pub use records::{NamedRecord, OverwritePolicy, RecordBook, SaveOutcome, RECORDS_KEY};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
