pub mod app;
pub mod capture;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod generate;
pub mod locate;
pub mod log;
pub mod output;
pub mod records;
pub mod replay;
pub mod runtime;

pub use capture::{cmd_capture, CaptureArgs, CaptureStep};
pub use generate::{cmd_generate, GenerateArgs};
pub use locate::{cmd_locate, LocateArgs};
pub use log::{cmd_log, LogArgs};
pub use records::{cmd_records, RecordsArgs};
pub use replay::{cmd_replay, ReplayArgs};
