//! Subcommand implementations

use enceladus_capture::{list_devices, CaptureConfig, PcapSource};
use enceladus_core::{require_hardware_address, AgentConfig, Result};
use enceladus_pipeline::Pipeline;
use enceladus_sink::InfluxSink;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::args::{Cli, Commands, RunArgs};
use crate::exit::ExitStatus;

pub async fn dispatch(cli: Cli) -> ExitStatus {
    match cli.command {
        Commands::Run(args) => run(cli.config.as_deref(), &args).await,
        Commands::Devices => devices(),
    }
}

/// File values, then flag overrides, then validation
pub fn load_config(path: Option<&Path>, args: &RunArgs) -> Result<AgentConfig> {
    let mut config = AgentConfig::load_or_default(path)?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Run the capture pipeline until interrupted
pub async fn run(config_path: Option<&Path>, args: &RunArgs) -> ExitStatus {
    let config = match load_config(config_path, args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitStatus::Config;
        }
    };
    let alias = config.pipeline.device_alias().to_string();

    let local = match require_hardware_address(&alias) {
        Ok(mac) => mac,
        Err(e) => {
            warn!(interface = %alias, error = %e, "Frame direction cannot be classified");
            return ExitStatus::Startup;
        }
    };
    info!(interface = %alias, mac = %local, "Resolved local hardware address");

    let source = match PcapSource::open(&CaptureConfig::from_pipeline(&config.pipeline)) {
        Ok(source) => source,
        Err(e) => {
            error!(device = %config.pipeline.device, error = %e, "Failed to open capture");
            return ExitStatus::Startup;
        }
    };
    let sink = match InfluxSink::open(&config.metrics) {
        Ok(sink) => sink,
        Err(e) => {
            error!(url = %config.metrics.url, error = %e, "Failed to open metrics sink");
            return ExitStatus::Startup;
        }
    };

    // Handlers are in place before any stage reports ready
    let interrupt = match install_interrupt() {
        Ok(interrupt) => interrupt,
        Err(e) => {
            error!(error = %e, "Unable to install signal handlers");
            return ExitStatus::Startup;
        }
    };

    let agent = config.metrics.agent.clone();
    let pipeline = Pipeline::new(config.pipeline, agent, Arc::new(source), Arc::new(sink), local);
    let running = match pipeline.start(interrupt).await {
        Ok(running) => running,
        Err(e) => {
            error!(error = %e, "Pipeline startup failed");
            return ExitStatus::Startup;
        }
    };

    let summary = running.wait().await;
    info!(
        cause = %summary.cause,
        uptime_secs = summary.uptime.as_secs(),
        sink_failures = summary.sink_failures,
        "Agent stopped"
    );
    ExitStatus::from_summary(&summary)
}

/// Print the capture devices libpcap knows about
pub fn devices() -> ExitStatus {
    match list_devices() {
        Ok(devices) if devices.is_empty() => {
            println!("No capture devices found");
            ExitStatus::Clean
        }
        Ok(devices) => {
            for device in devices {
                println!("{}", device);
            }
            ExitStatus::Clean
        }
        Err(e) => {
            error!(error = %e, "Failed to list capture devices");
            ExitStatus::Startup
        }
    }
}

/// Register for SIGINT and SIGTERM; the returned future resolves on the
/// first of either
#[cfg(unix)]
fn install_interrupt() -> io::Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Interrupt received"),
            _ = sigterm.recv() => info!("Termination requested"),
        }
    })
}

/// Ctrl-C only; registration happens on first poll
#[cfg(not(unix))]
fn install_interrupt() -> io::Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received"),
            Err(e) => {
                error!(error = %e, "Unable to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use enceladus_core::Error;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let file = config_file("[pipeline]\ndevice = \"eth0\"\nhandlers = 2\n");
        let args = RunArgs {
            handlers: Some(4),
            influx_token: Some("secret".into()),
            ..RunArgs::default()
        };

        let config = load_config(Some(file.path()), &args).unwrap();
        assert_eq!(config.pipeline.device, "eth0");
        assert_eq!(config.pipeline.handlers, 4);
        assert_eq!(config.metrics.token, "secret");
    }

    #[test]
    fn test_load_config_validates_after_overrides() {
        let file = config_file("[pipeline]\ndevice = \"eth0\"\n");
        let args = RunArgs {
            decoders: Some(0),
            ..RunArgs::default()
        };

        let err = load_config(Some(file.path()), &args).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_load_config_device_from_flag_only() {
        let file = config_file("[metrics]\norg = \"lab\"\n");
        let args = RunArgs {
            device: Some("eth3".into()),
            ..RunArgs::default()
        };

        let config = load_config(Some(file.path()), &args).unwrap();
        assert_eq!(config.pipeline.device_alias(), "eth3");
        assert_eq!(config.metrics.org, "lab");
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = load_config(Some(&missing), &RunArgs::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let file = config_file("[pipeline]\ndevice = \"\"\n");
        let status = run(Some(file.path()), &RunArgs::default()).await;
        assert_eq!(status, ExitStatus::Config);
    }

    #[tokio::test]
    async fn test_run_unknown_interface_is_startup_failure() {
        let file = config_file("[pipeline]\ndevice = \"nonexistent_interface_xyz\"\n");
        let status = run(Some(file.path()), &RunArgs::default()).await;
        assert_eq!(status, ExitStatus::Startup);
    }

    #[tokio::test]
    async fn test_interrupt_handlers_install_eagerly() {
        let interrupt = install_interrupt().unwrap();
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), interrupt).await;
        assert!(pending.is_err());
    }
}
