//! mailfwd Core - Mail forwarding pipeline
//!
//! This crate provides the forwarding engine: recipient and sender
//! transformation, header rewriting, message assembly, outbound delivery
//! and the pipeline that moves each message through its storage states.

pub mod envelope;
pub mod event;
pub mod forwarder;
pub mod message;
pub mod outbound;

pub use envelope::{transform_recipients, transform_sender, AddressMatcher, TransformationResult};
pub use event::{InboundMessage, SesEvent, Verdict};
pub use forwarder::{ForwardOutcome, Forwarder, StorageLayout};
pub use message::{BufferedMessage, HeaderMap};
pub use outbound::{OutboundSender, SmtpRelaySender};
