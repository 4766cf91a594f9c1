//! SMTP relay sender

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    address::Envelope, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Tokio1Executor,
};
use mailfwd_common::config::OutboundConfig;
use mailfwd_common::{Address, Error, FaultKind, Result, SendError};
use tracing::{debug, info, warn};

use super::OutboundSender;

/// Relays messages through an SMTP submission server
pub struct SmtpRelaySender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelaySender {
    /// Build the transport from configuration
    pub fn new(config: &OutboundConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &config.host,
            ))
        }
        .map_err(|e| Error::Config(format!("Failed to create SMTP transport: {}", e)))?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            starttls = config.use_starttls,
            "SMTP relay configured"
        );

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl OutboundSender for SmtpRelaySender {
    async fn send(&self, from: &Address, to: &[Address], raw: &[u8]) -> Result<String> {
        let envelope = envelope(from, to)?;
        debug!(from = %from.address, recipients = to.len(), size = raw.len(), "Sending message");

        match self.transport.send_raw(&envelope, raw).await {
            Ok(response) => {
                let id = response.first_line().unwrap_or_default().trim().to_string();
                debug!(code = %response.code(), id = %id, "Relay accepted message");
                Ok(id)
            }
            Err(e) => {
                let code = e.status().map(|c| c.to_string());
                let fault = classify(code.as_deref(), e.is_client());
                warn!(error = %e, fault = %fault, "Relay rejected message");

                let mut err = SendError::new(e.to_string(), fault);
                if let Some(code) = code {
                    err = err.with_code(code);
                }
                Err(err.into())
            }
        }
    }
}

fn envelope(from: &Address, to: &[Address]) -> Result<Envelope> {
    let client_error = |message: String| Error::Send(SendError::new(message, FaultKind::Client));

    let sender = from
        .address
        .parse::<lettre::Address>()
        .map_err(|e| client_error(format!("Invalid from address {}: {}", from.address, e)))?;

    let recipients = to
        .iter()
        .map(|r| {
            r.address
                .parse::<lettre::Address>()
                .map_err(|e| client_error(format!("Invalid to address {}: {}", r.address, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Envelope::new(Some(sender), recipients)
        .map_err(|e| client_error(format!("Failed to create envelope: {}", e)))
}

/// Map an SMTP status code to a fault kind
fn classify(code: Option<&str>, client: bool) -> FaultKind {
    match code.and_then(|c| c.chars().next()) {
        Some('5') => FaultKind::Permanent,
        Some('4') => FaultKind::Transient,
        _ if client => FaultKind::Client,
        _ => FaultKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Some("550"), false), FaultKind::Permanent);
        assert_eq!(classify(Some("421"), false), FaultKind::Transient);
        assert_eq!(classify(None, true), FaultKind::Client);
        assert_eq!(classify(None, false), FaultKind::Unknown);
        assert_eq!(classify(Some("250"), false), FaultKind::Unknown);
    }

    #[test]
    fn test_envelope() {
        let from = Address::new(Some("John at john@example.com".to_string()), "public@example.com");
        let to = vec![
            Address::new(None, "a@example.com"),
            Address::new(Some("B".to_string()), "b@example.com"),
        ];

        let envelope = envelope(&from, &to).unwrap();

        assert_eq!(
            envelope.from().map(|a| a.to_string()),
            Some("public@example.com".to_string())
        );
        let recipients: Vec<String> = envelope.to().iter().map(|a| a.to_string()).collect();
        assert_eq!(recipients, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_envelope_without_recipients() {
        let from = Address::new(None, "public@example.com");

        match envelope(&from, &[]) {
            Err(Error::Send(err)) => assert_eq!(err.fault, FaultKind::Client),
            other => panic!("Expected client send error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_plain_transport() {
        let config = OutboundConfig {
            use_tls: false,
            use_starttls: false,
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };

        assert!(SmtpRelaySender::new(&config).is_ok());
    }
}
