//! Outbound delivery of forwarded messages

pub mod smtp;

pub use smtp::SmtpRelaySender;

use async_trait::async_trait;
use mailfwd_common::{Address, Result};

/// Sends assembled messages to their final destinations
#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Send raw message bytes, returning the provider's message id
    ///
    /// Failures are reported as [`mailfwd_common::Error::Send`].
    async fn send(&self, from: &Address, to: &[Address], raw: &[u8]) -> Result<String>;
}
