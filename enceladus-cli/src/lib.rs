//! Command-line entry point of the enceladus capture agent
//!
//! `enceladus run` captures on a device until interrupted;
//! `enceladus devices` lists what can be captured on.

pub mod args;
pub mod commands;
pub mod exit;
pub mod logging;

pub use args::{Cli, Commands, RunArgs};
pub use exit::ExitStatus;
