//! Common types for mailfwd

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use mail_parser::MessageParser;

use crate::{Error, Result};

/// Message identifier assigned by the receiving service
pub type MessageId = String;

/// Email address with an optional display name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub name: Option<String>,
    pub address: String,
}

impl Address {
    /// Create a new address from its parts
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()),
            address: address.into(),
        }
    }

    /// Parse a single RFC 5322 mailbox (`addr-spec` or `name <addr-spec>`)
    ///
    /// Encoded-word display names are decoded.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::address_parse(value, "empty address"));
        }
        if trimmed.contains(&['\r', '\n'][..]) {
            return Err(Error::address_parse(value, "line break in address"));
        }

        if let Some(address) = parse_quoted_local(trimmed, value)? {
            return Ok(address);
        }

        let raw = format!("From: {}\r\n\r\n", trimmed);
        let parsed = MessageParser::default()
            .parse(raw.as_bytes())
            .ok_or_else(|| Error::address_parse(value, "unparsable address"))?;

        let list = parsed
            .from()
            .and_then(|from| from.as_list())
            .ok_or_else(|| Error::address_parse(value, "no mailbox found"))?;

        let addr = match list {
            [single] => single,
            [] => return Err(Error::address_parse(value, "no mailbox found")),
            _ => return Err(Error::address_parse(value, "expected single address")),
        };

        let address = addr
            .address()
            .map(str::trim)
            .ok_or_else(|| Error::address_parse(value, "missing addr-spec"))?;
        validate_addr_spec(address).map_err(|reason| Error::address_parse(value, reason))?;

        let name = addr
            .name()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Self::new(name, address))
    }

    /// Local part (everything before the last `@`)
    pub fn local_part(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map(|(local, _)| local)
            .unwrap_or(&self.address)
    }

    /// Domain (everything after the last `@`)
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }
}

/// Mailboxes whose local part is a quoted string (`"a b"@example.com`)
///
/// The quoted form is kept as the address. Returns `None` for any other
/// mailbox.
fn parse_quoted_local(trimmed: &str, value: &str) -> Result<Option<Address>> {
    let (name, addr_spec) = match trimmed.strip_suffix('>').and_then(|s| s.rsplit_once('<')) {
        Some((name, addr_spec)) => (Some(name.trim()), addr_spec.trim()),
        None => (None, trimmed),
    };
    if !addr_spec.starts_with('"') {
        return Ok(None);
    }

    validate_addr_spec(addr_spec).map_err(|reason| Error::address_parse(value, reason))?;

    // Decode the display name through the regular path
    let name = match name.filter(|n| !n.is_empty()) {
        Some(name) => Address::parse(&format!("{} <quoted@example.invalid>", name))?.name,
        None => None,
    };
    Ok(Some(Address::new(name, addr_spec)))
}

fn validate_addr_spec(address: &str) -> std::result::Result<(), &'static str> {
    let (local, domain) = address.rsplit_once('@').ok_or("missing @ in addr-spec")?;
    if local.is_empty() || domain.is_empty() {
        return Err("empty local part or domain");
    }
    if domain.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("whitespace in addr-spec");
    }

    match local.strip_prefix('"') {
        Some(quoted) => validate_quoted_string(quoted),
        None if local.chars().any(|c| c.is_whitespace() || c.is_control()) => {
            Err("whitespace in addr-spec")
        }
        None => Ok(()),
    }
}

/// Body of a quoted local part after its opening quote
fn validate_quoted_string(quoted: &str) -> std::result::Result<(), &'static str> {
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.next().is_some() => {}
            '"' if chars.as_str().is_empty() => return Ok(()),
            c if c == '"' || c == '\\' || (c.is_control() && c != '\t') => {
                return Err("invalid quoted local part")
            }
            _ => {}
        }
    }
    Err("unterminated quoted local part")
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = self.name.as_deref() else {
            return f.write_str(&self.address);
        };

        if name.chars().all(|c| c == ' ' || c == '\t' || c.is_ascii_graphic()) {
            f.write_str("\"")?;
            for c in name.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{}", c)?;
            }
            write!(f, "\" <{}>", self.address)
        } else {
            write!(
                f,
                "=?utf-8?b?{}?= <{}>",
                general_purpose::STANDARD.encode(name.as_bytes()),
                self.address
            )
        }
    }
}
