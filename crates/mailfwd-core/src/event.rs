//! Inbound receipt notifications
//!
//! Model of the notification the receiving service emits for each received
//! message. Only the fields the pipeline needs are kept.

use serde::{Deserialize, Serialize};

use mailfwd_common::MessageId;

/// Notification with one or more receipt records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SesEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SesRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesRecord {
    #[serde(default)]
    pub event_source: String,
    #[serde(default)]
    pub event_version: String,
    pub ses: SesMessage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SesMessage {
    pub mail: SesMail,
    pub receipt: SesReceipt,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesMail {
    pub message_id: MessageId,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: Vec<String>,
    #[serde(default)]
    pub common_headers: CommonHeaders,
}

/// Parsed copies of the message's main headers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonHeaders {
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesReceipt {
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub spam_verdict: VerdictStatus,
    #[serde(default)]
    pub virus_verdict: VerdictStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictStatus {
    #[serde(default)]
    pub status: Verdict,
}

/// Outcome of a spam or virus scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    Gray,
    ProcessingFailed,
    Disabled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Verdict {
    /// Definitive failure; other outcomes do not block forwarding
    pub fn is_fail(self) -> bool {
        self == Verdict::Fail
    }
}

/// What the pipeline needs to know about one received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: MessageId,
    /// Envelope recipients
    pub recipients: Vec<String>,
    /// Original From header values
    pub senders: Vec<String>,
    pub spam_verdict: Verdict,
    pub virus_verdict: Verdict,
}

impl InboundMessage {
    pub fn is_spam_or_virus(&self) -> bool {
        self.spam_verdict.is_fail() || self.virus_verdict.is_fail()
    }
}

impl From<SesMessage> for InboundMessage {
    fn from(message: SesMessage) -> Self {
        Self {
            message_id: message.mail.message_id,
            recipients: message.receipt.recipients,
            senders: message.mail.common_headers.from,
            spam_verdict: message.receipt.spam_verdict.status,
            virus_verdict: message.receipt.virus_verdict.status,
        }
    }
}

impl From<SesRecord> for InboundMessage {
    fn from(record: SesRecord) -> Self {
        record.ses.into()
    }
}
