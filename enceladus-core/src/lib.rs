//! enceladus core library
//!
//! This crate provides the shared types, error handling and configuration
//! used by every part of the enceladus capture agent.

pub mod config;
pub mod error;
pub mod frame;
pub mod interface;
pub mod types;

// Re-export commonly used types
pub use config::{AgentConfig, MetricsConfig, PipelineConfig, MAX_QUEUE_CAPACITY};
pub use error::{Error, Result};
pub use frame::Frame;
pub use interface::{hardware_addresses, require_hardware_address, resolve_hardware_address};
pub use types::{LinkType, MacAddr};
