//! Header rewriting for forwarded messages

use mailfwd_common::{Address, ParsedConfig};
use tracing::debug;

use super::{
    HeaderMap, DKIM_SIGNATURE_SUFFIX, FROM, MESSAGE_ID, REPLY_TO, RETURN_PATH, SENDER, SUBJECT,
    TO, X_FORWARDER_FUNCTION_NAME, X_FORWARDER_MESSAGE_ID, X_FORWARDER_ORIGINAL_FROM,
};

/// Rewrite headers so the message can be sent from `sender`
///
/// The original From is kept as Reply-To unless one is already present.
/// Headers that would be invalid after the From change are removed,
/// including every DKIM signature.
pub fn rewrite_headers(config: &ParsedConfig, headers: &mut HeaderMap, sender: &Address) {
    let original_from = headers.get(FROM).map(<[u8]>::to_vec);

    if !headers.contains(REPLY_TO) {
        match original_from {
            Some(from) => set_header(headers, REPLY_TO, vec![from]),
            None => debug!("No From header, not adding Reply-To"),
        }
    }

    set_header(headers, FROM, vec![sender.to_string().into_bytes()]);

    let prefix = config.subject_prefix();
    if !prefix.is_empty() {
        let mut subject = prefix.as_bytes().to_vec();
        subject.extend_from_slice(headers.get(SUBJECT).unwrap_or_default());
        set_header(headers, SUBJECT, vec![subject]);
    }

    // The original To stays so the reader sees where the message was sent
    let to_email = config.to_email();
    if !to_email.is_empty() {
        set_header(headers, TO, vec![to_email.as_bytes().to_vec()]);
    }

    for name in [RETURN_PATH, SENDER, MESSAGE_ID] {
        remove_header(headers, name);
    }

    headers.retain(|entry| {
        let is_signature = is_dkim_signature(&entry.name);
        if is_signature {
            debug!(header = %entry.name, "Removing header");
        }
        !is_signature
    });
}

/// Add the informational forwarder headers
pub fn set_debug_headers(
    headers: &mut HeaderMap,
    message_id: &str,
    original_from: &[String],
    function_name: &str,
) {
    set_header(headers, X_FORWARDER_MESSAGE_ID, vec![message_id.into()]);
    set_header(
        headers,
        X_FORWARDER_ORIGINAL_FROM,
        original_from.iter().map(|from| from.as_bytes().to_vec()).collect(),
    );
    set_header(headers, X_FORWARDER_FUNCTION_NAME, vec![function_name.into()]);
}

fn is_dkim_signature(name: &str) -> bool {
    name.len() >= DKIM_SIGNATURE_SUFFIX.len()
        && name.as_bytes()[name.len() - DKIM_SIGNATURE_SUFFIX.len()..]
            .eq_ignore_ascii_case(DKIM_SIGNATURE_SUFFIX.as_bytes())
}

fn set_header(headers: &mut HeaderMap, name: &str, values: Vec<Vec<u8>>) {
    let printable: Vec<_> = values.iter().map(|v| String::from_utf8_lossy(v)).collect();
    debug!(header = %name, values = ?printable, "Setting header");
    headers.set(name, values);
}

fn remove_header(headers: &mut HeaderMap, name: &str) {
    if headers.remove(name).is_some() {
        debug!(header = %name, "Removing header");
    }
}
