//! Sender Transformer
//!
//! Outbound relays only accept verified From addresses. The forwarded
//! message is sent from a verified address and the original sender is
//! kept in the display name.

use mailfwd_common::{Address, Error, ParsedConfig, Result};
use tracing::debug;

use super::recipients::TransformationResult;

/// Build the substitute sender for a forwarded message
///
/// The address comes from the configured `fromEmail`, or else from the
/// first original recipient. The display name is derived from the first
/// original sender only; further senders and recipients are ignored.
pub fn transform_sender(
    config: &ParsedConfig,
    senders: &[String],
    transformations: &[TransformationResult],
) -> Result<Address> {
    let parsed = senders
        .iter()
        .map(|s| Address::parse(s))
        .collect::<Result<Vec<_>>>()?;

    let address = if config.from_email().is_empty() {
        transformations
            .first()
            .map(|t| t.source.address.clone())
            .ok_or_else(|| Error::Internal("no recipient transformations".to_string()))?
    } else {
        Address::parse(config.from_email())?.address
    };

    let original = parsed
        .first()
        .ok_or_else(|| Error::InvalidAddress("no original sender".to_string()))?;

    let name = match &original.name {
        Some(name) => format!("{} at {}", name, original.address),
        None => original.address.clone(),
    };

    let sender = Address::new(Some(name), address);
    debug!(original = %original, sender = %sender, "Transformed sender");
    Ok(sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailfwd_common::RawConfig;
    use pretty_assertions::assert_eq;

    fn config(from_email: &str) -> ParsedConfig {
        ParsedConfig::parse(RawConfig {
            from_email: from_email.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn transformations(sources: &[&str]) -> Vec<TransformationResult> {
        sources
            .iter()
            .map(|s| TransformationResult {
                source: Address::parse(s).unwrap(),
                transformed: vec![Address::new(None, "dest@example.com")],
            })
            .collect()
    }

    fn senders(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_address_only_sender() {
        let sender = transform_sender(
            &config(""),
            &senders(&["sender@example.com"]),
            &transformations(&["public-address@example.com"]),
        )
        .unwrap();

        assert_eq!(
            sender.to_string(),
            "\"sender@example.com\" <public-address@example.com>"
        );
    }

    #[test]
    fn test_named_sender() {
        let sender = transform_sender(
            &config(""),
            &senders(&["\"John Doe\" <sender@example.com>"]),
            &transformations(&["public@example.com"]),
        )
        .unwrap();

        assert_eq!(
            sender.to_string(),
            "\"John Doe at sender@example.com\" <public@example.com>"
        );
    }

    #[test]
    fn test_from_override() {
        let sender = transform_sender(
            &config("forwarder@example.com"),
            &senders(&["\"John Doe\" <sender@example.com>"]),
            &transformations(&["public@example.com"]),
        )
        .unwrap();

        assert_eq!(
            sender.to_string(),
            "\"John Doe at sender@example.com\" <forwarder@example.com>"
        );
    }

    #[test]
    fn test_only_first_sender_and_recipient_used() {
        let sender = transform_sender(
            &config(""),
            &senders(&["First <first@example.com>", "Second <second@example.com>"]),
            &transformations(&["one@example.com", "two@example.com"]),
        )
        .unwrap();

        assert_eq!(
            sender,
            Address::new(
                Some("First at first@example.com".to_string()),
                "one@example.com"
            )
        );
    }

    #[test]
    fn test_invalid_sender() {
        let result = transform_sender(
            &config(""),
            &senders(&["sender@example.com", "broken <"]),
            &transformations(&["public@example.com"]),
        );

        assert!(matches!(result, Err(Error::AddressParse { .. })));
    }

    #[test]
    fn test_no_senders() {
        let result = transform_sender(&config(""), &[], &transformations(&["public@example.com"]));
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_no_transformations() {
        let result = transform_sender(&config(""), &senders(&["sender@example.com"]), &[]);
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
