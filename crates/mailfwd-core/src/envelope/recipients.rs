//! Recipient Transformer

use mailfwd_common::{Address, Error, ParsedConfig, Result};
use tracing::{debug, info};

use super::matcher::AddressMatcher;

/// Destinations resolved for one original recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationResult {
    pub source: Address,
    pub transformed: Vec<Address>,
}

/// Resolve every envelope recipient to its forward destinations
///
/// All recipients are parsed before any lookup happens, so a single
/// malformed address fails the whole call. Fails with
/// [`Error::NoDestinations`] when no recipient resolves to anything.
pub fn transform_recipients(
    config: &ParsedConfig,
    recipients: &[String],
) -> Result<Vec<TransformationResult>> {
    let parsed = recipients
        .iter()
        .map(|r| Address::parse(r))
        .collect::<Result<Vec<_>>>()?;

    let matcher = AddressMatcher::new(config);
    let mut results = Vec::with_capacity(parsed.len());

    for source in parsed {
        let transformed = matcher.resolve(&source.address)?.to_vec();
        debug!(
            recipient = %source.address,
            normalized = %matcher.normalize(&source.address),
            destinations = transformed.len(),
            "Transformed recipient"
        );
        results.push(TransformationResult {
            source,
            transformed,
        });
    }

    let total: usize = results.iter().map(|r| r.transformed.len()).sum();
    if total == 0 {
        return Err(Error::NoDestinations);
    }

    info!(recipients = results.len(), destinations = total, "Resolved recipients");
    Ok(results)
}
