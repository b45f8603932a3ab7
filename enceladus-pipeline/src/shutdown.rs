//! Shutdown triggers

use std::fmt;
use tokio::sync::mpsc;

/// Why the pipeline is shutting down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// External interrupt (Ctrl-C)
    Interrupt,
    /// The capture source failed or ended mid-run
    CaptureFault(String),
    /// A pipeline stage can no longer make progress
    StageFault(String),
    /// Shutdown asked for through a [`ShutdownTrigger`]
    Requested,
}

impl ShutdownCause {
    /// Whether the shutdown was caused by a runtime failure
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ShutdownCause::CaptureFault(_) | ShutdownCause::StageFault(_)
        )
    }
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownCause::Interrupt => write!(f, "interrupt"),
            ShutdownCause::CaptureFault(reason) => write!(f, "capture fault: {}", reason),
            ShutdownCause::StageFault(reason) => write!(f, "stage fault: {}", reason),
            ShutdownCause::Requested => write!(f, "requested"),
        }
    }
}

/// Asks the orchestrator to shut the pipeline down
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownCause>,
}

impl ShutdownTrigger {
    /// Request shutdown. Only the first cause is acted on; later ones are
    /// ignored.
    pub fn trigger(&self, cause: ShutdownCause) {
        let _ = self.tx.try_send(cause);
    }
}

pub(crate) fn shutdown_channel() -> (ShutdownTrigger, mpsc::Receiver<ShutdownCause>) {
    let (tx, rx) = mpsc::channel(8);
    (ShutdownTrigger { tx }, rx)
}
