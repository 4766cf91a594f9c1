//! Envelope transformation
//!
//! Maps original recipients to forward destinations and derives the
//! substitute sender the forwarded copy is sent from.

pub mod matcher;
pub mod recipients;
pub mod sender;

pub use matcher::{strip_plus_tags, AddressMatcher, MatchKind};
pub use recipients::{transform_recipients, TransformationResult};
pub use sender::transform_sender;
