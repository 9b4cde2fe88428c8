use clap::Subcommand;

use super::capture::CaptureArgs;
use super::generate::GenerateArgs;
use super::locate::LocateArgs;
use super::log::LogArgs;
use super::records::RecordsArgs;
use super::replay::ReplayArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Synthesize a locator for an element of an HTML snapshot
    Locate(LocateArgs),

    /// Feed a scripted event sequence through the recorder
    Capture(CaptureArgs),

    /// Show or edit the current action log
    Log(LogArgs),

    /// Manage named records
    Records(RecordsArgs),

    /// Render the action log as test code
    Generate(GenerateArgs),

    /// Replay the action log against a live Chrome tab
    Replay(ReplayArgs),
}
