//! Address Matcher - Resolves a recipient to its forward destinations

use mailfwd_common::{Address, Error, ParsedConfig, Result};
use std::collections::HashMap;
use tracing::debug;

/// Key shape that resolved a recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Full address, e.g. `info@example.com`
    Exact,
    /// Domain wildcard, e.g. `@example.com`
    Domain,
    /// Local part only, e.g. `info`
    LocalPart,
    /// Global wildcard `@`
    Wildcard,
}

/// Resolves recipients against the forward mapping
///
/// Matching is case-insensitive on the whole address. Local parts are
/// case-sensitive per RFC 5321, this matcher deliberately ignores that.
pub struct AddressMatcher<'a> {
    mapping: &'a HashMap<String, Vec<Address>>,
    strip_plus: bool,
}

impl<'a> AddressMatcher<'a> {
    /// Create a matcher over a parsed configuration
    pub fn new(config: &'a ParsedConfig) -> Self {
        Self::from_mapping(&config.forward_mapping, config.allow_plus_sign())
    }

    /// Create a matcher over a mapping with lowercased keys
    pub fn from_mapping(mapping: &'a HashMap<String, Vec<Address>>, strip_plus: bool) -> Self {
        Self {
            mapping,
            strip_plus,
        }
    }

    /// Lowercase the address and strip plus tags if enabled
    pub fn normalize(&self, address: &str) -> String {
        let lowered = address.to_lowercase();
        if self.strip_plus {
            strip_plus_tags(&lowered)
        } else {
            lowered
        }
    }

    /// Destinations for a recipient address, empty if nothing matches
    ///
    /// First match wins: exact, `@domain`, local part, `@`.
    pub fn resolve(&self, address: &str) -> Result<&'a [Address]> {
        Ok(self
            .lookup(address)?
            .map(|(_, destinations)| destinations)
            .unwrap_or_default())
    }

    /// Like [`resolve`](Self::resolve), also reporting which key shape matched
    pub fn lookup(&self, address: &str) -> Result<Option<(MatchKind, &'a [Address])>> {
        let normalized = self.normalize(address);
        debug!(original = %address, normalized = %normalized, "Matching recipient");

        if let Some(destinations) = self.mapping.get(&normalized) {
            return Ok(Some((MatchKind::Exact, destinations)));
        }

        let (local_part, domain) = normalized
            .rsplit_once('@')
            .ok_or_else(|| Error::InvalidAddress(format!("failed to split address {}", normalized)))?;

        let candidates = [
            (MatchKind::Domain, format!("@{}", domain)),
            (MatchKind::LocalPart, local_part.to_string()),
            (MatchKind::Wildcard, "@".to_string()),
        ];

        Ok(candidates.into_iter().find_map(|(kind, key)| {
            self.mapping
                .get(&key)
                .map(|destinations| (kind, destinations.as_slice()))
        }))
    }
}

/// Remove every `+tag` between a plus sign and the next `@`
///
/// `user+tag@domain` becomes `user@domain`.
pub fn strip_plus_tags(address: &str) -> String {
    let mut result = String::with_capacity(address.len());
    let mut rest = address;

    while let Some(plus) = rest.find('+') {
        match rest[plus..].find('@') {
            Some(at) => {
                result.push_str(&rest[..plus]);
                result.push('@');
                rest = &rest[plus + at + 1..];
            }
            None => break,
        }
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapping(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<Address>> {
        entries
            .iter()
            .map(|(key, destinations)| {
                (
                    key.to_string(),
                    destinations
                        .iter()
                        .map(|d| Address::parse(d).unwrap())
                        .collect(),
                )
            })
            .collect()
    }

    fn addresses(destinations: &[Address]) -> Vec<&str> {
        destinations.iter().map(|d| d.address.as_str()).collect()
    }

    #[test]
    fn test_strip_plus_tags() {
        assert_eq!(strip_plus_tags("user+tag@example.com"), "user@example.com");
        assert_eq!(strip_plus_tags("user+a+b@example.com"), "user@example.com");
        assert_eq!(strip_plus_tags("user@example.com"), "user@example.com");
        assert_eq!(strip_plus_tags("user@exa+mple.com"), "user@exa+mple.com");
        assert_eq!(strip_plus_tags("+@example.com"), "@example.com");
    }

    #[test]
    fn test_plus_sign_stripping() {
        let mapping = mapping(&[("abuse@example.com", &["jim@example.com"])]);

        let matcher = AddressMatcher::from_mapping(&mapping, true);
        assert_eq!(
            addresses(matcher.resolve("abuse+me@example.com").unwrap()),
            vec!["jim@example.com"]
        );

        let matcher = AddressMatcher::from_mapping(&mapping, false);
        assert!(matcher.resolve("abuse+me@example.com").unwrap().is_empty());
    }

    #[test]
    fn test_priority_cascade() {
        let mapping = mapping(&[
            ("info@example.com", &["a@example.com"]),
            ("@example.com", &["b@example.com"]),
            ("info", &["c@example.com"]),
            ("@", &["d@example.com"]),
        ]);
        let matcher = AddressMatcher::from_mapping(&mapping, false);

        let cases = [
            ("info@example.com", MatchKind::Exact, "a@example.com"),
            ("test@example.com", MatchKind::Domain, "b@example.com"),
            ("info@bar.net", MatchKind::LocalPart, "c@example.com"),
            ("foo@bar.com", MatchKind::Wildcard, "d@example.com"),
        ];

        for (input, kind, expected) in cases {
            let (matched, destinations) = matcher.lookup(input).unwrap().unwrap();
            assert_eq!(matched, kind, "match kind for {}", input);
            assert_eq!(addresses(destinations), vec![expected], "destinations for {}", input);
        }
    }

    #[test]
    fn test_exact_match_returns_whole_list_in_order() {
        let mapping = mapping(&[
            ("info@example.com", &["john@example.com", "jen@example.com"]),
            ("@example.com", &["domain@example.com"]),
            ("@", &["wildcard@example.com"]),
        ]);
        let matcher = AddressMatcher::from_mapping(&mapping, true);

        assert_eq!(
            addresses(matcher.resolve("info@example.com").unwrap()),
            vec!["john@example.com", "jen@example.com"]
        );
    }

    #[test]
    fn test_case_insensitive_match() {
        let mapping = mapping(&[("info@example.com", &["a@example.com"])]);
        let matcher = AddressMatcher::from_mapping(&mapping, false);

        assert_eq!(
            addresses(matcher.resolve("INFO@Example.COM").unwrap()),
            vec!["a@example.com"]
        );
    }

    #[test]
    fn test_no_match_is_empty() {
        let mapping = mapping(&[("info@example.com", &["a@example.com"])]);
        let matcher = AddressMatcher::from_mapping(&mapping, false);

        assert!(matcher.resolve("other@example.org").unwrap().is_empty());
        assert_eq!(matcher.lookup("other@example.org").unwrap(), None);
    }

    #[test]
    fn test_address_without_at_is_invalid() {
        let mapping = mapping(&[]);
        let matcher = AddressMatcher::from_mapping(&mapping, false);

        assert!(matches!(
            matcher.resolve("no-at-sign"),
            Err(Error::InvalidAddress(_))
        ));
    }
}
