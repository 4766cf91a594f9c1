//! Configuration for mailfwd

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::types::Address;

/// Forwarder configuration as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    /// Address the From header is rewritten to (if set)
    #[serde(default)]
    pub from_email: String,

    /// Address the To header is rewritten to (if set)
    #[serde(default)]
    pub to_email: String,

    /// Prefix added to the Subject header (if set)
    #[serde(default)]
    pub subject_prefix: String,

    /// Strip `+tag` from recipient local parts before lookup
    #[serde(default)]
    pub allow_plus_sign: bool,

    /// Mapping of incoming recipients to forward destinations
    #[serde(default)]
    pub forward_mapping: HashMap<String, Vec<String>>,

    /// Storage configuration
    #[serde(default, alias = "s3")]
    pub storage: StorageConfig,

    /// Outbound relay configuration
    #[serde(default)]
    pub outbound: OutboundConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Runtime identity reported in the debug headers
    #[serde(default)]
    pub function_name: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Storage backend: "fs", "memory" or "s3"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Base path for local filesystem storage
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Bucket name (object storage backends)
    #[serde(default)]
    pub bucket_name: String,

    /// Prefixes for incoming messages by state
    #[serde(default)]
    pub incoming: IncomingPrefixes,

    /// Prefixes for outgoing messages by state
    #[serde(default)]
    pub outgoing: OutgoingPrefixes,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
            bucket_name: String::new(),
            incoming: IncomingPrefixes::default(),
            outgoing: OutgoingPrefixes::default(),
        }
    }
}

fn default_storage_backend() -> String {
    "fs".to_string()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("/var/lib/mailfwd")
}

/// Key prefixes for incoming messages
///
/// Prefixes are concatenated with the message id as is, so they must end
/// with a path separator themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPrefixes {
    /// Where the receiving service stores new messages
    #[serde(default = "default_new_prefix")]
    pub new_prefix: String,

    #[serde(default = "default_spam_virus_prefix")]
    pub spam_virus_prefix: String,

    #[serde(default = "default_forwarded_prefix")]
    pub forwarded_prefix: String,

    #[serde(default = "default_incoming_failed_prefix")]
    pub failed_prefix: String,
}

impl Default for IncomingPrefixes {
    fn default() -> Self {
        Self {
            new_prefix: default_new_prefix(),
            spam_virus_prefix: default_spam_virus_prefix(),
            forwarded_prefix: default_forwarded_prefix(),
            failed_prefix: default_incoming_failed_prefix(),
        }
    }
}

fn default_new_prefix() -> String {
    "in/new/".to_string()
}

fn default_spam_virus_prefix() -> String {
    "in/spam-virus/".to_string()
}

fn default_forwarded_prefix() -> String {
    "in/forwarded/".to_string()
}

fn default_incoming_failed_prefix() -> String {
    "in/failed/".to_string()
}

/// Key prefixes for outgoing messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPrefixes {
    #[serde(default = "default_sent_prefix")]
    pub sent_prefix: String,

    #[serde(default = "default_outgoing_failed_prefix")]
    pub failed_prefix: String,
}

impl Default for OutgoingPrefixes {
    fn default() -> Self {
        Self {
            sent_prefix: default_sent_prefix(),
            failed_prefix: default_outgoing_failed_prefix(),
        }
    }
}

fn default_sent_prefix() -> String {
    "out/sent/".to_string()
}

fn default_outgoing_failed_prefix() -> String {
    "out/failed/".to_string()
}

/// Outbound relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundConfig {
    /// Relay host
    #[serde(default = "default_outbound_host")]
    pub host: String,

    /// Relay port
    #[serde(default = "default_outbound_port")]
    pub port: u16,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Implicit TLS
    #[serde(default)]
    pub use_tls: bool,

    #[serde(default = "default_true")]
    pub use_starttls: bool,

    /// Send timeout in seconds
    #[serde(default = "default_outbound_timeout")]
    pub timeout_secs: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            host: default_outbound_host(),
            port: default_outbound_port(),
            username: None,
            password: None,
            use_tls: false,
            use_starttls: true,
            timeout_secs: default_outbound_timeout(),
        }
    }
}

fn default_outbound_host() -> String {
    "localhost".to_string()
}

fn default_outbound_port() -> u16 {
    587
}

fn default_outbound_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

enum Format {
    Json,
    Toml,
}

fn format_for(path: &Path) -> Format {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
        _ => Format::Json,
    }
}

impl RawConfig {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_str_with_format(&content, format_for(path))
    }

    /// Parse a JSON configuration document
    pub fn from_json(content: &str) -> crate::Result<Self> {
        Self::from_str_with_format(content, Format::Json)
    }

    /// Parse a TOML configuration document
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        Self::from_str_with_format(content, Format::Toml)
    }

    fn from_str_with_format(content: &str, format: Format) -> crate::Result<Self> {
        match format {
            Format::Json => serde_json::from_str(content)
                .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e))),
            Format::Toml => toml::from_str(content)
                .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e))),
        }
    }

    /// Write configuration to file, in the format matching its extension
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = match format_for(path) {
            Format::Json => serde_json::to_string_pretty(self).map_err(|e| {
                crate::Error::Config(format!("Failed to serialize config: {}", e))
            })?,
            Format::Toml => toml::to_string_pretty(self).map_err(|e| {
                crate::Error::Config(format!("Failed to serialize config: {}", e))
            })?,
        };

        std::fs::write(path, content)
            .map_err(|e| crate::Error::Config(format!("Failed to write config file: {}", e)))
    }

    /// Candidate config file locations, in lookup order
    pub fn candidate_paths(environment: Option<&str>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        match environment.filter(|e| !e.is_empty()) {
            Some(env) => {
                paths.push(PathBuf::from(format!("./config.{}.json", env)));
                paths.push(PathBuf::from(format!("./config.{}.toml", env)));
            }
            None => {
                paths.push(PathBuf::from("./config.json"));
                paths.push(PathBuf::from("./config.toml"));
            }
        }
        paths.push(PathBuf::from("/etc/mailfwd/config.json"));
        paths.push(PathBuf::from("/etc/mailfwd/config.toml"));
        paths
    }

    /// Load configuration from environment and file
    pub fn load() -> crate::Result<Self> {
        if let Ok(path) = std::env::var("MAILFWD_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        let environment = std::env::var("ENVIRONMENT").ok();
        for path in Self::candidate_paths(environment.as_deref()) {
            if path.exists() {
                tracing::info!(path = %path.display(), "Loading config file");
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

/// Validated configuration with parsed forward destinations
///
/// Mapping keys are lowercased so lookups can compare against a lowercased
/// recipient.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub raw: RawConfig,
    pub forward_mapping: HashMap<String, Vec<Address>>,
}

impl ParsedConfig {
    /// Validate a raw configuration
    pub fn parse(raw: RawConfig) -> crate::Result<Self> {
        for (field, value) in [("fromEmail", &raw.from_email), ("toEmail", &raw.to_email)] {
            if !value.is_empty() {
                Address::parse(value).map_err(|e| {
                    crate::Error::Config(format!("invalid {}: {}", field, e))
                })?;
            }
        }

        let mut forward_mapping = HashMap::with_capacity(raw.forward_mapping.len());

        for (key, destinations) in &raw.forward_mapping {
            let parsed = destinations
                .iter()
                .map(|destination| {
                    Address::parse(destination).map_err(|e| {
                        crate::Error::Config(format!(
                            "invalid address in mapping: {} => {}, {}",
                            key, destination, e
                        ))
                    })
                })
                .collect::<crate::Result<Vec<_>>>()?;

            let normalized = key.to_lowercase();
            if forward_mapping.insert(normalized.clone(), parsed).is_some() {
                return Err(crate::Error::Config(format!(
                    "duplicate mapping key after lowercasing: {}",
                    normalized
                )));
            }
        }

        Ok(Self {
            raw,
            forward_mapping,
        })
    }

    /// Load and validate configuration from the default locations
    pub fn load() -> crate::Result<Arc<Self>> {
        Ok(Arc::new(Self::parse(RawConfig::load()?)?))
    }

    /// Load and validate configuration from a file
    pub fn from_file(path: &Path) -> crate::Result<Arc<Self>> {
        Ok(Arc::new(Self::parse(RawConfig::from_file(path)?)?))
    }

    pub fn from_email(&self) -> &str {
        &self.raw.from_email
    }

    pub fn to_email(&self) -> &str {
        &self.raw.to_email
    }

    pub fn subject_prefix(&self) -> &str {
        &self.raw.subject_prefix
    }

    pub fn allow_plus_sign(&self) -> bool {
        self.raw.allow_plus_sign
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.raw.storage
    }
}
