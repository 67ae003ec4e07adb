//! WolfMirror Configuration
//!
//! Configuration structures for mirroring one filer directory into another
//! cluster.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main WolfMirror configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WolfMirrorConfig {
    /// Where entries and chunks are replicated from
    pub source: SourceConfig,

    /// Where entries and chunks are replicated to
    pub sink: SinkConfig,

    /// Chunk transfer tuning
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source filer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source filer address (host:port)
    pub filer: String,

    /// Only entries under this directory are replicated
    #[serde(default = "default_directory")]
    pub directory: String,
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink kind, looked up in the sink registry
    #[serde(default = "default_sink_kind")]
    pub kind: String,

    /// Destination filer address (host:port)
    #[serde(default)]
    pub filer: String,

    /// Replicated keys are rooted under this directory
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Replica placement for written chunks, e.g. "001"
    #[serde(default)]
    pub replication: String,

    #[serde(default)]
    pub collection: String,

    /// Chunk time-to-live in seconds, 0 keeps chunks forever
    #[serde(default)]
    pub ttl_sec: i32,

    #[serde(default)]
    pub data_center: String,
}

/// Chunk transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Chunk copies in flight per entry, 0 for one per chunk
    #[serde(default)]
    pub max_concurrent_transfers: usize,

    /// Filer connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Filer request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Volume server read/upload timeout in milliseconds
    #[serde(default = "default_upload_timeout_ms")]
    pub upload_timeout_ms: u64,

    /// Talk to volume servers over https
    #[serde(default)]
    pub use_https: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_directory() -> String {
    "/".to_string()
}

fn default_sink_kind() -> String {
    "filer".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_upload_timeout_ms() -> u64 {
    300000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            filer: String::new(),
            directory: default_directory(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: default_sink_kind(),
            filer: String::new(),
            directory: default_directory(),
            replication: String::new(),
            collection: String::new(),
            ttl_sec: 0,
            data_center: String::new(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 0,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            upload_timeout_ms: default_upload_timeout_ms(),
            use_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl WolfMirrorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: WolfMirrorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Sample configuration written by `wolfmirror init`
    pub fn sample() -> Self {
        Self {
            source: SourceConfig {
                filer: "source-filer:18888".into(),
                directory: "/buckets".into(),
            },
            sink: SinkConfig {
                filer: "backup-filer:18888".into(),
                directory: "/backup".into(),
                replication: "001".into(),
                ..Default::default()
            },
            transfer: TransferConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.filer.is_empty() {
            return Err(Error::Config("source.filer cannot be empty".into()));
        }

        if !self.source.directory.starts_with('/') {
            return Err(Error::Config("source.directory must be absolute".into()));
        }

        if self.sink.kind.is_empty() {
            return Err(Error::Config("sink.kind cannot be empty".into()));
        }

        if self.sink.kind == "filer" && self.sink.filer.is_empty() {
            return Err(Error::Config("sink.filer cannot be empty".into()));
        }

        if !self.sink.directory.starts_with('/') {
            return Err(Error::Config("sink.directory must be absolute".into()));
        }

        if self.sink.ttl_sec < 0 {
            return Err(Error::Config("sink.ttl_sec cannot be negative".into()));
        }

        if self.transfer.connect_timeout_ms == 0
            || self.transfer.request_timeout_ms == 0
            || self.transfer.upload_timeout_ms == 0
        {
            return Err(Error::Config("transfer timeouts must be positive".into()));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(Error::Config(format!(
                "logging.format must be pretty or json, got {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

impl TransferConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }
}
