//! Message handling
//!
//! A stored message is parsed into a [`BufferedMessage`], its headers are
//! rewritten for forwarding, and the result is assembled back into wire
//! format.

pub mod build;
pub mod headers;
pub mod parse;
pub mod rewrite;

pub use build::build_message;
pub use headers::{HeaderEntry, HeaderMap};
pub use parse::parse_message;
pub use rewrite::{rewrite_headers, set_debug_headers};

use mailfwd_common::Result;

/// RFC 5322 line delimiter
pub const LINE_DELIMITER: &str = "\r\n";

/// Largest message the outbound relay is expected to accept (40 MiB)
pub const MAX_MESSAGE_SIZE: u64 = 40 * 1024 * 1024;

pub const FROM: &str = "From";
pub const REPLY_TO: &str = "Reply-To";
pub const SUBJECT: &str = "Subject";
pub const TO: &str = "To";
pub const RETURN_PATH: &str = "Return-Path";
pub const SENDER: &str = "Sender";
pub const MESSAGE_ID: &str = "Message-Id";

/// Any header ending in this name (case-insensitive) is a DKIM signature
pub const DKIM_SIGNATURE_SUFFIX: &str = "dkim-signature";

pub const X_FORWARDER_MESSAGE_ID: &str = "X-Forwarder-Message-Id";
pub const X_FORWARDER_ORIGINAL_FROM: &str = "X-Forwarder-Original-From";
pub const X_FORWARDER_FUNCTION_NAME: &str = "X-Forwarder-Function-Name";

/// A message held fully in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedMessage {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl BufferedMessage {
    /// Parse raw message bytes
    pub fn parse(raw: &[u8]) -> Result<Self> {
        parse_message(raw)
    }

    /// Assemble the message into wire format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        build_message(self)
    }
}
