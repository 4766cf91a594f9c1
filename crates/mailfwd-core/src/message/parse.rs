//! Raw message parser
//!
//! Splits a stored message into its header block and an opaque body.
//! Header fields are located with `mail-parser` and copied from the raw
//! bytes, so 8-bit values and folds survive unchanged.

use mail_parser::MessageParser;
use mailfwd_common::{Error, Result};

use super::{BufferedMessage, HeaderMap};

/// Parse raw message bytes into headers and body
///
/// CRLF and bare LF line endings are both accepted; folds are kept with
/// CRLF. Surrounding whitespace is trimmed from each value. One trailing
/// line delimiter is removed from the body.
pub fn parse_message(raw: &[u8]) -> Result<BufferedMessage> {
    if raw.is_empty() {
        return Err(Error::Parse("empty message".to_string()));
    }
    if matches!(raw[0], b' ' | b'\t') {
        return Err(Error::Parse(
            "continuation line before first header".to_string(),
        ));
    }

    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Parse("unparsable message".to_string()))?;

    let mut headers = HeaderMap::new();
    for header in message.headers() {
        let end = header.offset_end.min(raw.len());
        let field = raw.get(header.offset_field..end).unwrap_or_default();
        let (name, value) = split_field(field)?;
        headers.append(name, value);
    }

    if headers.is_empty() {
        return Err(Error::Parse("no headers found".to_string()));
    }

    let body_start = message.root_part().raw_body_offset().min(raw.len());
    let body = strip_trailing_delimiter(&raw[body_start..]).to_vec();

    Ok(BufferedMessage { headers, body })
}

/// Split one raw header field into its name and normalized value
fn split_field(field: &[u8]) -> Result<(String, Vec<u8>)> {
    let colon = field.iter().position(|&b| b == b':').ok_or_else(|| {
        Error::Parse(format!(
            "malformed header line: {}",
            String::from_utf8_lossy(field)
        ))
    })?;

    let name = parse_name(trim_end(&field[..colon]))?;
    let value = normalize_folds(trim_end(trim_start(&field[colon + 1..])));
    Ok((name, value))
}

fn parse_name(name: &[u8]) -> Result<String> {
    if name.is_empty() || !name.iter().all(|&b| (33..=126).contains(&b)) {
        return Err(Error::Parse(format!(
            "invalid header name: {}",
            String::from_utf8_lossy(name)
        )));
    }
    // Printable ASCII is valid UTF-8
    Ok(String::from_utf8_lossy(name).into_owned())
}

fn is_fold_whitespace(b: &u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn trim_start(value: &[u8]) -> &[u8] {
    let start = value
        .iter()
        .position(|b| !is_fold_whitespace(b))
        .unwrap_or(value.len());
    &value[start..]
}

fn trim_end(value: &[u8]) -> &[u8] {
    let end = value
        .iter()
        .rposition(|b| !is_fold_whitespace(b))
        .map_or(0, |i| i + 1);
    &value[..end]
}

/// Rewrite bare LF folds as CRLF
fn normalize_folds(value: &[u8]) -> Vec<u8> {
    let mut normalized = Vec::with_capacity(value.len());
    for (i, &b) in value.iter().enumerate() {
        if b == b'\n' && (i == 0 || value[i - 1] != b'\r') {
            normalized.push(b'\r');
        }
        normalized.push(b);
    }
    normalized
}

fn strip_trailing_delimiter(body: &[u8]) -> &[u8] {
    body.strip_suffix(b"\r\n")
        .or_else(|| body.strip_suffix(b"\n"))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::build_message;
    use pretty_assertions::assert_eq;

    fn header<'a>(message: &'a BufferedMessage, name: &str) -> Option<&'a [u8]> {
        message.headers.get(name)
    }

    #[test]
    fn test_parse_simple_message() {
        let raw = b"From: sender@example.com\r\nTo: info@example.com\r\nSubject: Hello\r\n\r\nBody line\r\n";
        let message = parse_message(raw).unwrap();

        assert_eq!(header(&message, "From"), Some(b"sender@example.com".as_slice()));
        assert_eq!(header(&message, "to"), Some(b"info@example.com".as_slice()));
        assert_eq!(header(&message, "Subject"), Some(b"Hello".as_slice()));
        assert_eq!(message.body, b"Body line");
    }

    #[test]
    fn test_parse_bare_lf() {
        let raw = b"From: sender@example.com\nSubject: Hi\n\nline one\nline two\n";
        let message = parse_message(raw).unwrap();

        assert_eq!(message.headers.len(), 2);
        assert_eq!(message.body, b"line one\nline two");
    }

    #[test]
    fn test_parse_folded_header() {
        let raw = b"DKIM-Signature: v=1; a=rsa-sha256;\r\n\tc=relaxed/relaxed;\r\n b=abc\r\nFrom: a@example.com\r\n\r\n";
        let message = parse_message(raw).unwrap();

        assert_eq!(
            header(&message, "DKIM-Signature"),
            Some(b"v=1; a=rsa-sha256;\r\n\tc=relaxed/relaxed;\r\n b=abc".as_slice())
        );
        assert!(message.body.is_empty());
    }

    #[test]
    fn test_bare_lf_folds_become_crlf() {
        let raw = b"Received: from a\n by b\nFrom: a@example.com\n\nbody\n";
        let message = parse_message(raw).unwrap();

        assert_eq!(header(&message, "Received"), Some(b"from a\r\n by b".as_slice()));
    }

    #[test]
    fn test_parse_repeated_headers() {
        let raw = b"Received: one\r\nFrom: a@example.com\r\nreceived: two\r\n\r\nbody";
        let message = parse_message(raw).unwrap();

        let names: Vec<_> = message.headers.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Received", "From"]);
        assert_eq!(
            message.headers.get_all("Received").unwrap(),
            &[b"one".to_vec(), b"two".to_vec()]
        );
        assert_eq!(message.body, b"body");
    }

    #[test]
    fn test_body_is_opaque() {
        let raw = b"From: a@example.com\r\n\r\n\r\nFrom: not-a-header\r\n\r\n";
        let message = parse_message(raw).unwrap();

        assert_eq!(message.headers.len(), 1);
        assert_eq!(message.body, b"\r\nFrom: not-a-header\r\n");
    }

    #[test]
    fn test_headers_without_separator() {
        let message = parse_message(b"From: a@example.com\r\n").unwrap();
        assert_eq!(header(&message, "From"), Some(b"a@example.com".as_slice()));
        assert!(message.body.is_empty());
    }

    #[test]
    fn test_eight_bit_header_value_kept() {
        let raw = b"Subject: caf\xe9\r\nFrom: a@example.com\r\n\r\nbody";
        let message = parse_message(raw).unwrap();
        assert_eq!(header(&message, "Subject"), Some(b"caf\xe9".as_slice()));

        let built = build_message(&message).unwrap();
        assert_eq!(built, b"Subject: caf\xe9\r\nFrom: a@example.com\r\n\r\nbody\r\n");
    }

    #[test]
    fn test_whitespace_only_continuation() {
        let raw = b"Subject: hi\r\n \r\nFrom: a@example.com\r\n\r\nbody\r\n";
        let message = parse_message(raw).unwrap();
        assert_eq!(header(&message, "Subject"), Some(b"hi".as_slice()));

        let built = build_message(&message).unwrap();
        assert_eq!(built, b"Subject: hi\r\nFrom: a@example.com\r\n\r\nbody\r\n");
    }

    #[test]
    fn test_bare_cr_in_value_is_assembled() {
        let raw = b"Subject: a\rb\r\nFrom: a@example.com\r\n\r\nbody\r\n";
        let message = parse_message(raw).unwrap();

        let built = build_message(&message).unwrap();
        assert!(built.starts_with(b"Subject: a\rb\r\n"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_message(b""), Err(Error::Parse(_))));
        assert!(matches!(
            parse_message(b" continued\r\nFrom: a@example.com\r\n\r\n"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_message(b"\r\nbody only"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_message(b"Bad Name: value\r\n\r\n"),
            Err(Error::Parse(_))
        ));
    }
}
