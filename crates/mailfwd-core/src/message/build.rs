//! Message assembly

use mailfwd_common::{Error, Result};

use super::{BufferedMessage, LINE_DELIMITER};

/// Serialize a message into RFC 5322 wire format
///
/// Each header is written as one `Name: value1,value2` line, followed by
/// an empty line, the body unchanged, and a final line delimiter.
pub fn build_message(message: &BufferedMessage) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(message.body.len() + 4096);

    for entry in &message.headers {
        validate_name(&entry.name)?;
        for value in &entry.values {
            validate_value(&entry.name, value)?;
        }

        buffer.extend_from_slice(entry.name.as_bytes());
        buffer.extend_from_slice(b": ");
        buffer.extend_from_slice(&entry.values.join(&b","[..]));
        buffer.extend_from_slice(LINE_DELIMITER.as_bytes());
    }

    // Header/body separator
    buffer.extend_from_slice(LINE_DELIMITER.as_bytes());
    buffer.extend_from_slice(&message.body);
    buffer.extend_from_slice(LINE_DELIMITER.as_bytes());

    Ok(buffer)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.bytes().all(|b| (33..=126).contains(&b) && b != b':') {
        return Err(Error::Internal(format!("invalid header name: {:?}", name)));
    }
    Ok(())
}

/// Line breaks are only allowed as folds: CRLF followed by whitespace
fn validate_value(name: &str, value: &[u8]) -> Result<()> {
    for (i, &b) in value.iter().enumerate() {
        let valid = match b {
            b'\n' => {
                i > 0
                    && value[i - 1] == b'\r'
                    && matches!(value.get(i + 1), Some(b' ') | Some(b'\t'))
            }
            _ => true,
        };
        if !valid {
            return Err(Error::Internal(format!(
                "invalid line break in header {}",
                name
            )));
        }
    }
    Ok(())
}
