//! CLI argument parsing
//!
//! Every `run` flag overrides the matching field of the configuration file.

use clap::{Args, Parser, Subcommand};
use enceladus_core::AgentConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "enceladus")]
#[command(version, about = "Live network-frame capture agent", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.enceladus.toml when present)
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture frames and forward link-layer metrics
    Run(RunArgs),

    /// List capture devices
    Devices,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Capture device
    #[arg(short = 'i', long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Interface name for the hardware-address lookup and the device tag
    #[arg(long, value_name = "NAME")]
    pub alias: Option<String>,

    /// Snapshot length in bytes
    #[arg(short = 's', long, value_name = "BYTES")]
    pub snaplen: Option<i32>,

    /// Kernel capture buffer size in bytes
    #[arg(short = 'B', long, value_name = "BYTES")]
    pub buffer_size: Option<i32>,

    /// Put the device in promiscuous mode
    #[arg(short = 'p', long)]
    pub promiscuous: bool,

    /// Handling workers
    #[arg(long, value_name = "N")]
    pub handlers: Option<usize>,

    /// Decoding workers
    #[arg(long, value_name = "M")]
    pub decoders: Option<usize>,

    /// Relay queue capacity
    #[arg(long, value_name = "FRAMES")]
    pub relay_capacity: Option<usize>,

    /// Seconds between capture statistics reports
    #[arg(long, value_name = "SECONDS")]
    pub stats_interval: Option<u64>,

    /// Capture read timeout
    #[arg(long, value_name = "MS")]
    pub capture_timeout: Option<u64>,

    /// Metrics store URL
    #[arg(long, value_name = "URL")]
    pub influx_url: Option<String>,

    /// Metrics store API token
    #[arg(long, env = "ENCELADUS_INFLUX_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub influx_token: Option<String>,

    #[arg(long, value_name = "ORG")]
    pub org: Option<String>,

    #[arg(long, value_name = "BUCKET")]
    pub bucket: Option<String>,

    /// Value of the agent tag
    #[arg(long, value_name = "NAME")]
    pub agent: Option<String>,
}

impl RunArgs {
    /// Override configuration fields with the flags that were given
    pub fn apply(&self, config: &mut AgentConfig) {
        let pipeline = &mut config.pipeline;
        if let Some(device) = &self.device {
            pipeline.device = device.clone();
        }
        if let Some(alias) = &self.alias {
            pipeline.device_alias = Some(alias.clone());
        }
        if let Some(snaplen) = self.snaplen {
            pipeline.snap_length = snaplen;
        }
        if let Some(buffer_size) = self.buffer_size {
            pipeline.buffer_size = buffer_size;
        }
        if self.promiscuous {
            pipeline.promiscuous = true;
        }
        if let Some(handlers) = self.handlers {
            pipeline.handlers = handlers;
        }
        if let Some(decoders) = self.decoders {
            pipeline.decoders = decoders;
        }
        if let Some(capacity) = self.relay_capacity {
            pipeline.relay_capacity = Some(capacity);
        }
        if let Some(secs) = self.stats_interval {
            pipeline.stats_interval_secs = secs;
        }
        if let Some(ms) = self.capture_timeout {
            pipeline.capture_timeout_ms = ms;
        }

        let metrics = &mut config.metrics;
        if let Some(url) = &self.influx_url {
            metrics.url = url.clone();
        }
        if let Some(token) = &self.influx_token {
            metrics.token = token.clone();
        }
        if let Some(org) = &self.org {
            metrics.org = org.clone();
        }
        if let Some(bucket) = &self.bucket {
            metrics.bucket = bucket.clone();
        }
        if let Some(agent) = &self.agent {
            metrics.agent = agent.clone();
        }
    }
}
