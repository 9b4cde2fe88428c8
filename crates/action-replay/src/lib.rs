//! Replay of a recorded action log against a live tab.
//!
//! The engine attaches one debugger session, enables the page domains, waits briefly for the
//! page to settle and then executes each step in order: comments and assertions are skipped,
//! waits sleep, clicks resolve a center point in-page and dispatch mouse events, type/select
//! set values through an in-page script. The first failure aborts the run and the session is
//! always detached.

mod engine;
mod errors;
pub mod scripts;

pub use engine::{ReplayEngine, ReplayOptions, ReplayReport};
pub use errors::{ReplayError, ResolveFailure};
pub use tokio_util::sync::CancellationToken;
