//! Replication Sinks
//!
//! A sink applies entry-level changes to a destination. Sinks are built by
//! kind through a [`SinkRegistry`] populated at startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::filer_sink::FilerSink;
use super::source::ChunkSource;
use super::upload::ChunkUploader;
use crate::config::{SinkConfig, TransferConfig};
use crate::error::{Error, Result};
use crate::filer::Entry;
use crate::network::FilerConnectionPool;

/// Destination for replicated entry changes
#[async_trait]
pub trait ReplicationSink: Send + Sync {
    /// Sink kind, as named in configuration
    fn name(&self) -> &'static str;

    /// Directory that replicated keys are rooted under
    fn sink_to_directory(&self) -> &str;

    async fn create_entry(&self, ctx: &CancellationToken, key: &str, entry: &Entry) -> Result<()>;

    /// Apply a change from `old_entry` to `new_entry`
    ///
    /// Fails with `Error::NotFound` when there is no destination entry to
    /// reconcile against.
    async fn update_entry(
        &self,
        ctx: &CancellationToken,
        key: &str,
        old_entry: &Entry,
        new_parent_path: &str,
        new_entry: &Entry,
        delete_chunks: bool,
    ) -> Result<()>;

    async fn delete_entry(
        &self,
        ctx: &CancellationToken,
        key: &str,
        is_directory: bool,
        delete_data: bool,
    ) -> Result<()>;
}

/// Shared services handed to every sink constructor
#[derive(Clone)]
pub struct SinkContext {
    pub pool: Arc<FilerConnectionPool>,
    pub source: Arc<dyn ChunkSource>,
    pub uploader: Arc<dyn ChunkUploader>,
    pub transfer: TransferConfig,
}

impl SinkContext {
    pub fn new(
        pool: Arc<FilerConnectionPool>,
        source: Arc<dyn ChunkSource>,
        uploader: Arc<dyn ChunkUploader>,
        transfer: TransferConfig,
    ) -> Self {
        Self {
            pool,
            source,
            uploader,
            transfer,
        }
    }

    /// Pool sized from the transfer timeouts
    pub fn pool_for(transfer: &TransferConfig) -> Arc<FilerConnectionPool> {
        Arc::new(FilerConnectionPool::new(
            transfer.connect_timeout(),
            transfer.request_timeout(),
        ))
    }
}

/// Builds a sink from its configuration section
pub type SinkConstructor = fn(&SinkConfig, &SinkContext) -> Result<Arc<dyn ReplicationSink>>;

/// Sink kind -> constructor
#[derive(Default)]
pub struct SinkRegistry {
    constructors: HashMap<String, SinkConstructor>,
}

impl SinkRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in sink kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("filer", FilerSink::from_config);
        registry
    }

    pub fn register(&mut self, kind: &str, constructor: SinkConstructor) {
        self.constructors.insert(kind.to_string(), constructor);
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(
        &self,
        config: &SinkConfig,
        ctx: &SinkContext,
    ) -> Result<Arc<dyn ReplicationSink>> {
        let constructor = self
            .constructors
            .get(&config.kind)
            .ok_or_else(|| Error::UnknownSink(config.kind.clone()))?;
        constructor(config, ctx)
    }
}
