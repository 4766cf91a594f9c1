//! mailfwd Common - Shared types and utilities
//!
//! This crate provides the configuration, error and address types
//! shared across all mailfwd components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ParsedConfig, RawConfig};
pub use error::{Error, FaultKind, Result, SendError};
pub use types::{Address, MessageId};
