//! Process exit status

use enceladus_pipeline::ShutdownSummary;
use std::process::ExitCode;

/// How the process ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Clean shutdown after an interrupt
    Clean,
    /// The capture failed while running
    Fault,
    /// Bad configuration or usage
    Config,
    /// Nothing was started
    Startup,
    Logging,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::Fault => 1,
            ExitStatus::Config => 2,
            ExitStatus::Startup => 3,
            ExitStatus::Logging => 4,
        }
    }

    pub fn from_summary(summary: &ShutdownSummary) -> Self {
        if summary.is_clean() {
            ExitStatus::Clean
        } else {
            ExitStatus::Fault
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enceladus_pipeline::{DecodeStats, ShutdownCause};
    use std::time::Duration;

    fn summary(cause: ShutdownCause, worker_failures: usize) -> ShutdownSummary {
        ShutdownSummary {
            cause,
            counters: None,
            relayed: 0,
            decode: DecodeStats::default(),
            worker_failures,
            sink_failures: 3,
            uptime: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_codes() {
        assert_eq!(ExitStatus::Clean.code(), 0);
        assert_eq!(ExitStatus::Fault.code(), 1);
        assert_eq!(ExitStatus::Config.code(), 2);
        assert_eq!(ExitStatus::Startup.code(), 3);
        assert_eq!(ExitStatus::Logging.code(), 4);
    }

    #[test]
    fn test_from_summary() {
        // Sink failures alone do not make a run unclean
        assert_eq!(
            ExitStatus::from_summary(&summary(ShutdownCause::Interrupt, 0)),
            ExitStatus::Clean
        );
        assert_eq!(
            ExitStatus::from_summary(&summary(ShutdownCause::CaptureFault("gone".into()), 0)),
            ExitStatus::Fault
        );
        assert_eq!(
            ExitStatus::from_summary(&summary(ShutdownCause::StageFault("relay queue closed".into()), 0)),
            ExitStatus::Fault
        );
        assert_eq!(
            ExitStatus::from_summary(&summary(ShutdownCause::Interrupt, 1)),
            ExitStatus::Fault
        );
    }
}
