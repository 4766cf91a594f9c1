//! Forward pipeline
//!
//! Drives one received message from the incoming `new` state to one of
//! `spam-virus`, `failed` or `forwarded`. Every step runs once; retrying a
//! failed invocation is left to whatever delivered the event.

use std::sync::Arc;

use mailfwd_common::config::StorageConfig;
use mailfwd_common::{Address, Error, ParsedConfig, Result};
use mailfwd_storage::BlobStore;
use tracing::{error, info, warn};

use crate::envelope::{transform_recipients, transform_sender};
use crate::event::InboundMessage;
use crate::message::{
    build_message, parse_message, rewrite_headers, set_debug_headers, MAX_MESSAGE_SIZE,
};
use crate::outbound::OutboundSender;

/// Storage keys for each message state
///
/// Keys are the configured prefix followed directly by the message id.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    storage: StorageConfig,
}

impl StorageLayout {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            storage: storage.clone(),
        }
    }

    pub fn incoming_new(&self, message_id: &str) -> String {
        format!("{}{}", self.storage.incoming.new_prefix, message_id)
    }

    pub fn incoming_spam_virus(&self, message_id: &str) -> String {
        format!("{}{}", self.storage.incoming.spam_virus_prefix, message_id)
    }

    pub fn incoming_forwarded(&self, message_id: &str) -> String {
        format!("{}{}", self.storage.incoming.forwarded_prefix, message_id)
    }

    pub fn incoming_failed(&self, message_id: &str) -> String {
        format!("{}{}", self.storage.incoming.failed_prefix, message_id)
    }

    pub fn outgoing_sent(&self, message_id: &str) -> String {
        format!("{}{}", self.storage.outgoing.sent_prefix, message_id)
    }

    pub fn outgoing_failed(&self, message_id: &str) -> String {
        format!("{}{}", self.storage.outgoing.failed_prefix, message_id)
    }
}

/// Final state of a message that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Flagged by the spam or virus scan, not forwarded
    SpamVirus,
    /// Sent and moved to the forwarded state
    Forwarded { remote_message_id: String },
}

/// A message ready to be sent
struct Prepared {
    sender: Address,
    destinations: Vec<Address>,
    data: Vec<u8>,
}

/// Long-lived forwarding context shared by all invocations
pub struct Forwarder {
    config: Arc<ParsedConfig>,
    storage: Arc<dyn BlobStore>,
    sender: Arc<dyn OutboundSender>,
    layout: StorageLayout,
    function_name: String,
}

impl Forwarder {
    pub fn new(
        config: Arc<ParsedConfig>,
        storage: Arc<dyn BlobStore>,
        sender: Arc<dyn OutboundSender>,
    ) -> Self {
        let layout = StorageLayout::new(config.storage());
        let function_name = resolve_function_name(&config);
        Self {
            config,
            storage,
            sender,
            layout,
            function_name,
        }
    }

    /// Override the runtime identity reported in the debug headers
    pub fn with_function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = function_name.into();
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Forward one received message
    ///
    /// On any failure the stored message is moved to the failed state (best
    /// effort) and the original error is returned. A failure to record the
    /// forwarded state after a successful send is returned as well.
    pub async fn forward(&self, message: &InboundMessage) -> Result<ForwardOutcome> {
        let id = message.message_id.as_str();
        info!(message_id = %id, "Forwarding message");

        if message.is_spam_or_virus() {
            if message.spam_verdict.is_fail() {
                warn!(message_id = %id, "Message marked as spam");
            }
            if message.virus_verdict.is_fail() {
                warn!(message_id = %id, "Message marked as virus");
            }
            self.move_message(
                &self.layout.incoming_new(id),
                &self.layout.incoming_spam_virus(id),
            )
            .await?;
            return Ok(ForwardOutcome::SpamVirus);
        }

        let prepared = match self.prepare(message).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.mark_as_failed(id).await;
                return Err(e);
            }
        };

        let remote_message_id = match self.send(id, &prepared).await {
            Ok(remote_message_id) => remote_message_id,
            Err(e) => {
                self.mark_as_failed(id).await;
                return Err(e);
            }
        };

        self.move_message(
            &self.layout.incoming_new(id),
            &self.layout.incoming_forwarded(id),
        )
        .await?;

        info!(message_id = %id, remote_message_id = %remote_message_id, "Message forwarded");
        Ok(ForwardOutcome::Forwarded { remote_message_id })
    }

    async fn prepare(&self, message: &InboundMessage) -> Result<Prepared> {
        let id = message.message_id.as_str();

        info!(message_id = %id, recipients = ?message.recipients, "Transforming recipients");
        let transformations = transform_recipients(&self.config, &message.recipients)?;

        info!(message_id = %id, senders = ?message.senders, "Transforming sender");
        let sender = transform_sender(&self.config, &message.senders, &transformations)?;

        let raw = self.fetch(id).await?;
        let mut buffered = parse_message(&raw)?;

        rewrite_headers(&self.config, &mut buffered.headers, &sender);
        set_debug_headers(
            &mut buffered.headers,
            id,
            &message.senders,
            &self.function_name,
        );

        let data = build_message(&buffered)?;

        // Only the first recipient's destinations receive the message
        let destinations = transformations
            .into_iter()
            .next()
            .map(|t| t.transformed)
            .unwrap_or_default();

        Ok(Prepared {
            sender,
            destinations,
            data,
        })
    }

    async fn fetch(&self, message_id: &str) -> Result<Vec<u8>> {
        let key = self.layout.incoming_new(message_id);
        let object = self.storage.get(&key).await.map_err(|e| {
            Error::Fetch(format!("failed to get message with key {}: {}", key, e))
        })?;

        info!(
            message_id = %message_id,
            size_mib = %format!("{:.1}", object.size as f64 / (1024.0 * 1024.0)),
            "Fetched message"
        );
        if object.size > MAX_MESSAGE_SIZE {
            warn!(
                message_id = %message_id,
                size = object.size,
                limit = MAX_MESSAGE_SIZE,
                "Message exceeds the relay size limit, sending will most likely fail"
            );
        }

        Ok(object.data)
    }

    async fn send(&self, message_id: &str, prepared: &Prepared) -> Result<String> {
        let destinations: Vec<String> = prepared.destinations.iter().map(|d| d.to_string()).collect();
        info!(message_id = %message_id, destinations = ?destinations, "Sending message");

        match self
            .sender
            .send(&prepared.sender, &prepared.destinations, &prepared.data)
            .await
        {
            Ok(remote_message_id) => {
                self.store(&self.layout.outgoing_sent(message_id), &prepared.data)
                    .await?;
                Ok(remote_message_id)
            }
            Err(e) => {
                error!(message_id = %message_id, error = %e, code = e.code(), "Failed to send message");

                let key = self.layout.outgoing_failed(message_id);
                if let Err(store_err) = self.store(&key, &prepared.data).await {
                    warn!(key = %key, error = %store_err, "Failed to store unsent message");
                }
                Err(e)
            }
        }
    }

    async fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        self.storage
            .put(key, data)
            .await
            .map_err(|e| Error::Storage(format!("failed to store message at {}: {}", key, e)))?;
        info!(key = %key, "Stored message");
        Ok(())
    }

    async fn move_message(&self, source: &str, target: &str) -> Result<()> {
        self.storage.move_object(source, target).await.map_err(|e| {
            Error::Storage(format!(
                "failed to move message from {} to {}: {}",
                source, target, e
            ))
        })?;
        info!(source = %source, target = %target, "Moved message");
        Ok(())
    }

    async fn mark_as_failed(&self, message_id: &str) {
        let source = self.layout.incoming_new(message_id);
        let target = self.layout.incoming_failed(message_id);
        if let Err(e) = self.move_message(&source, &target).await {
            warn!(message_id = %message_id, error = %e, "Failed to mark message as failed");
        }
    }
}

/// Runtime identity for the debug headers
///
/// Configured `functionName`, else `AWS_LAMBDA_FUNCTION_NAME`, else the
/// package name.
pub fn resolve_function_name(config: &ParsedConfig) -> String {
    config
        .raw
        .function_name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| {
            std::env::var("AWS_LAMBDA_FUNCTION_NAME")
                .ok()
                .filter(|n| !n.is_empty())
        })
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
