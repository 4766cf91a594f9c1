//! Error types for mailfwd

use std::fmt;

use thiserror::Error;

/// Main error type for mailfwd
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address {value:?}: {reason}")]
    AddressParse { value: String, reason: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("No recipients after transformation")]
    NoDestinations,

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Send error: {0}")]
    Send(SendError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for mailfwd
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for an [`Error::AddressParse`]
    pub fn address_parse(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::AddressParse {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::AddressParse { .. } => "ADDRESS_PARSE_ERROR",
            Error::InvalidAddress(_) => "INVALID_ADDRESS",
            Error::NoDestinations => "NO_DESTINATIONS",
            Error::Fetch(_) => "FETCH_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Send(_) => "SEND_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<SendError> for Error {
    fn from(err: SendError) -> Self {
        Error::Send(err)
    }
}

/// Fault classification reported by the outbound provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The provider rejected the message for good
    Permanent,
    /// The provider may accept the message later
    Transient,
    /// The request never reached the provider (connection, TLS, envelope)
    Client,
    Unknown,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::Permanent => "permanent",
            FaultKind::Transient => "transient",
            FaultKind::Client => "client",
            FaultKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Outbound provider failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError {
    /// Provider error code, when one was returned
    pub code: Option<String>,
    pub message: String,
    pub fault: FaultKind,
}

impl SendError {
    pub fn new(message: impl Into<String>, fault: FaultKind) -> Self {
        Self {
            code: None,
            message: message.into(),
            fault,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to send message (code: {}, message: {}, fault: {})",
            self.code.as_deref().unwrap_or("-"),
            self.message,
            self.fault
        )
    }
}
