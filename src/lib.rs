//! Recorder Studio library
//!
//! Settings, the studio coordinator and the command-line front end.

pub mod app_settings;
pub mod cli;
pub mod coordinator;
pub mod errors;
pub mod metrics;

pub use app_settings::{CodegenConfig, Config};
pub use coordinator::{StudioCoordinator, StudioNotice};
pub use errors::StudioFailure;
