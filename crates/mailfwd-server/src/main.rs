//! mailfwd - Forwards received messages to their mapped destinations
//!
//! Reads a receipt notification (JSON) from the file given as the first
//! argument, or from stdin, and runs the forward pipeline for each record.

use anyhow::{Context, Result};
use mailfwd_common::config::LoggingConfig;
use mailfwd_common::ParsedConfig;
use mailfwd_core::{ForwardOutcome, Forwarder, InboundMessage, SesEvent, SmtpRelaySender};
use mailfwd_storage::{create_storage, BlobStore};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ParsedConfig::load().context("Failed to load config")?;
    init_logging(&config.raw.logging);

    info!(
        mappings = config.forward_mapping.len(),
        backend = %config.storage().backend,
        "Starting mailfwd"
    );

    let storage: Arc<dyn BlobStore> = Arc::from(create_storage(config.storage())?);
    let sender = Arc::new(SmtpRelaySender::new(&config.raw.outbound)?);
    let forwarder = Forwarder::new(config, storage, sender);

    let input = read_input(std::env::args().nth(1)).await?;
    let event = parse_event(&input)?;

    process_event(&forwarder, event).await
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format.eq_ignore_ascii_case("text") {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    } else {
        registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .init();
    }
}

async fn read_input(path: Option<String>) -> Result<String> {
    match path.as_deref() {
        Some(path) if path != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path)),
        _ => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read event from stdin")?;
            Ok(input)
        }
    }
}

fn parse_event(input: &str) -> Result<SesEvent> {
    serde_json::from_str(input).context("Failed to parse receipt notification")
}

/// Forward every record in order, stopping at the first failure
async fn process_event(forwarder: &Forwarder, event: SesEvent) -> Result<()> {
    for record in event.records {
        if let Ok(json) = serde_json::to_string(&record) {
            debug!(record = %json, "Processing record");
        }

        let message = InboundMessage::from(record);
        match forwarder.forward(&message).await {
            Ok(ForwardOutcome::SpamVirus) => {
                info!(message_id = %message.message_id, "Message quarantined as spam/virus");
            }
            Ok(ForwardOutcome::Forwarded { remote_message_id }) => {
                info!(
                    message_id = %message.message_id,
                    remote_message_id = %remote_message_id,
                    "Message forwarded"
                );
            }
            Err(e) => {
                error!(
                    message_id = %message.message_id,
                    code = e.code(),
                    error = %e,
                    "Forwarding failed"
                );
                return Err(e).with_context(|| {
                    format!("Failed to forward message {}", message.message_id)
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailfwd_common::config::OutboundConfig;
    use mailfwd_common::RawConfig;
    use mailfwd_storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn record(message_id: &str, spam: &str) -> String {
        format!(
            r#"{{"eventSource":"aws:ses","ses":{{"mail":{{"messageId":"{}","commonHeaders":{{"from":["a@example.com"]}}}},"receipt":{{"recipients":["info@example.com"],"spamVerdict":{{"status":"{}"}},"virusVerdict":{{"status":"PASS"}}}}}}}}"#,
            message_id, spam
        )
    }

    fn forwarder(storage: Arc<MemoryStorage>) -> Forwarder {
        let config = Arc::new(ParsedConfig::parse(RawConfig::default()).unwrap());
        let sender = SmtpRelaySender::new(&OutboundConfig {
            use_starttls: false,
            ..Default::default()
        })
        .unwrap();
        Forwarder::new(config, storage, Arc::new(sender))
    }

    #[test]
    fn test_parse_event() {
        let input = format!(r#"{{"Records":[{},{}]}}"#, record("a", "PASS"), record("b", "FAIL"));
        let event = parse_event(&input).unwrap();

        let ids: Vec<_> = event
            .records
            .iter()
            .map(|r| r.ses.mail.message_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(parse_event("not json").is_err());
    }

    #[tokio::test]
    async fn test_records_processed_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        for id in ["a", "b"] {
            storage.put(&format!("in/new/{}", id), b"raw").await.unwrap();
        }
        let input = format!(r#"{{"Records":[{},{}]}}"#, record("a", "FAIL"), record("b", "FAIL"));

        process_event(&forwarder(storage.clone()), parse_event(&input).unwrap())
            .await
            .unwrap();

        assert_eq!(
            storage.keys().await,
            vec!["in/spam-virus/a".to_string(), "in/spam-virus/b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let storage = Arc::new(MemoryStorage::new());
        for id in ["a", "c"] {
            storage.put(&format!("in/new/{}", id), b"raw").await.unwrap();
        }
        let input = format!(
            r#"{{"Records":[{},{},{}]}}"#,
            record("a", "FAIL"),
            record("b", "FAIL"),
            record("c", "FAIL")
        );

        let result = process_event(&forwarder(storage.clone()), parse_event(&input).unwrap()).await;

        assert!(result.is_err());
        assert_eq!(
            storage.keys().await,
            vec!["in/new/c".to_string(), "in/spam-virus/a".to_string()]
        );
    }
}
