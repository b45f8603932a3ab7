//! Agent configuration
//!
//! Configuration is read once from a TOML file, overridden field by field
//! from the command line, validated, and then shared read-only:
//!
//! ```toml
//! [pipeline]
//! device = "eth0"
//! decoders = 5
//! stats_interval_secs = 60
//!
//! [metrics]
//! url = "http://localhost:8086"
//! org = "enceladus"
//! bucket = "enceladus"
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the home directory
pub const CONFIG_FILE_NAME: &str = ".enceladus.toml";

/// Relay queue slots per decoder when no capacity is configured
pub const RELAY_SLOTS_PER_DECODER: usize = 2000;

/// Largest accepted relay queue, metrics buffer or batch
pub const MAX_QUEUE_CAPACITY: usize = 1 << 24;

/// Largest accepted worker count of one stage
pub const MAX_STAGE_WORKERS: usize = 1024;

/// Complete configuration of one agent process
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub pipeline: PipelineConfig,
    pub metrics: MetricsConfig,
}

impl AgentConfig {
    /// `~/.enceladus.toml`, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::ConfigParse { reason, .. } => Error::ConfigParse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Load an explicitly named file, or the default file when it exists.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.metrics.validate()
    }
}

/// Settings of the capture pipeline, immutable once the pipeline starts
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Capture device identifier
    pub device: String,
    /// Interface name used for the hardware-address lookup and the
    /// `device` tag; falls back to `device`
    pub device_alias: Option<String>,
    /// Frame snapshot length in bytes
    pub snap_length: i32,
    /// Kernel capture buffer size in bytes
    pub buffer_size: i32,
    pub promiscuous: bool,
    /// Handling Stage pool size
    pub handlers: usize,
    /// Decoding Stage pool size
    pub decoders: usize,
    /// Relay queue capacity; falls back to `RELAY_SLOTS_PER_DECODER * decoders`
    pub relay_capacity: Option<usize>,
    pub stats_interval_secs: u64,
    /// Capture read timeout in milliseconds
    pub capture_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            device_alias: None,
            snap_length: 1600,
            buffer_size: 320_000_000,
            promiscuous: false,
            handlers: 1,
            decoders: 5,
            relay_capacity: None,
            stats_interval_secs: 60,
            capture_timeout_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Configuration for `device` with every other value at its default
    pub fn for_device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }

    pub fn device_alias(&self) -> &str {
        self.device_alias.as_deref().unwrap_or(&self.device)
    }

    pub fn relay_capacity(&self) -> usize {
        self.relay_capacity
            .unwrap_or_else(|| RELAY_SLOTS_PER_DECODER.saturating_mul(self.decoders))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(Error::invalid_config("pipeline.device", "a capture device is required"));
        }
        if self.device_alias.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err(Error::invalid_config("pipeline.device_alias", "must not be empty"));
        }
        if self.snap_length <= 0 {
            return Err(Error::invalid_config("pipeline.snap_length", "must be positive"));
        }
        if self.buffer_size <= 0 {
            return Err(Error::invalid_config("pipeline.buffer_size", "must be positive"));
        }
        let pools = [
            ("pipeline.handlers", self.handlers),
            ("pipeline.decoders", self.decoders),
        ];
        for (name, workers) in pools {
            if workers == 0 {
                return Err(Error::invalid_config(name, "must be at least 1"));
            }
            if workers > MAX_STAGE_WORKERS {
                return Err(Error::invalid_config(
                    name,
                    format!("must be at most {}", MAX_STAGE_WORKERS),
                ));
            }
        }
        check_capacity("pipeline.relay_capacity", self.relay_capacity())?;
        if self.stats_interval_secs == 0 {
            return Err(Error::invalid_config("pipeline.stats_interval_secs", "must be at least 1"));
        }
        // A zero read timeout blocks the reader thread forever on an idle device
        if self.capture_timeout_ms == 0 {
            return Err(Error::invalid_config("pipeline.capture_timeout_ms", "must be at least 1"));
        }
        Ok(())
    }
}

/// Connection and batching settings of the metrics store
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Value of the `agent` tag on every point
    pub agent: String,
    /// Points per write request
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    /// Points buffered between the pipeline and the writer
    pub buffer_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: "enceladus".to_string(),
            bucket: "enceladus".to_string(),
            agent: "enceladus".to_string(),
            batch_size: 5000,
            flush_interval_ms: 1000,
            buffer_capacity: 10_000,
        }
    }
}

impl MetricsConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::invalid_config("metrics.url", "must be an http(s) URL"));
        }
        if self.org.is_empty() {
            return Err(Error::invalid_config("metrics.org", "must not be empty"));
        }
        if self.bucket.is_empty() {
            return Err(Error::invalid_config("metrics.bucket", "must not be empty"));
        }
        check_capacity("metrics.batch_size", self.batch_size)?;
        check_capacity("metrics.buffer_capacity", self.buffer_capacity)?;
        if self.flush_interval_ms == 0 {
            return Err(Error::invalid_config("metrics.flush_interval_ms", "must be at least 1"));
        }
        Ok(())
    }
}

fn check_capacity(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid_config(name, "must be at least 1"));
    }
    if value > MAX_QUEUE_CAPACITY {
        return Err(Error::invalid_config(
            name,
            format!("must be at most {}", MAX_QUEUE_CAPACITY),
        ));
    }
    Ok(())
}
