//! Core infrastructure for X5 OS.
//!
//! Configuration loading and cooperative cancellation shared by the gateway,
//! the workflows and the command line.

mod cancel;
mod config;

pub use cancel::CancelToken;
pub use config::{Config, GatewayConfig, GeneralConfig, WorkflowConfig};
