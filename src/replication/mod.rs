//! Replication Module
//!
//! Applies filer metadata events to a destination sink, copying chunk
//! content between clusters as needed.

mod fetch_write;
mod filer_sink;
mod sink;
mod source;
mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch_write::{ChunkTransfer, TransferSettings};
pub use filer_sink::FilerSink;
pub use sink::{ReplicationSink, SinkConstructor, SinkContext, SinkRegistry};
pub use source::{ByteStream, ChunkSource, FilerSource, SourcePart};
pub use upload::{ChunkUploader, HttpUploader, UploadRequest, UploadResult};

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::filer::{Entry, FullPath};

/// Run `fut` unless `ctx` is cancelled first
///
/// A cancelled token wins even if `fut` is already complete.
pub async fn cancellable<T, F>(ctx: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// One metadata change observed on the source filer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationEvent {
    /// Full source path of the entry
    pub key: String,
    pub old_entry: Option<Entry>,
    pub new_entry: Option<Entry>,
    /// Source directory the entry lives in after the change
    pub new_parent_path: String,
    /// Remove chunk data that the change dropped
    pub delete_chunks: bool,
}

/// Maps source events under one directory onto a sink
pub struct Replicator {
    source_directory: String,
    sink: Arc<dyn ReplicationSink>,
}

impl Replicator {
    pub fn new(source_directory: impl Into<String>, sink: Arc<dyn ReplicationSink>) -> Self {
        Self {
            source_directory: source_directory.into(),
            sink,
        }
    }

    pub fn sink(&self) -> &Arc<dyn ReplicationSink> {
        &self.sink
    }

    /// Destination path for a source path, `None` outside the source directory
    pub fn sink_key(&self, key: &str) -> Option<String> {
        let root = self.source_directory.trim_end_matches('/');
        let relative = if root.is_empty() {
            key
        } else if key == root {
            ""
        } else {
            key.strip_prefix(root).filter(|rest| rest.starts_with('/'))?
        };

        let sink_root = self.sink.sink_to_directory().trim_end_matches('/');
        let mapped = format!("{}{}", sink_root, relative);
        Some(if mapped.is_empty() { "/".to_string() } else { mapped })
    }

    /// Apply one event to the sink
    pub async fn replicate(&self, ctx: &CancellationToken, event: &ReplicationEvent) -> Result<()> {
        let key = match self.sink_key(&event.key) {
            Some(key) => key,
            None => {
                debug!("Skipping {} outside {}", event.key, self.source_directory);
                return Ok(());
            }
        };

        match (&event.old_entry, &event.new_entry) {
            (None, None) => Ok(()),
            (Some(old), None) => {
                self.sink
                    .delete_entry(ctx, &key, old.is_directory, event.delete_chunks)
                    .await
            }
            (None, Some(new)) => self.sink.create_entry(ctx, &key, new).await,
            (Some(old), Some(new)) => {
                let parent = self.sink_parent(&event.new_parent_path, &key);
                match self
                    .sink
                    .update_entry(ctx, &key, old, &parent, new, event.delete_chunks)
                    .await
                {
                    Err(Error::NotFound(reason)) => {
                        info!("No destination entry for {} ({}), creating", key, reason);
                        self.sink.create_entry(ctx, &key, new).await
                    }
                    other => other,
                }
            }
        }
    }

    fn sink_parent(&self, new_parent_path: &str, sink_key: &str) -> String {
        if !new_parent_path.is_empty() {
            if let Some(parent) = self.sink_key(new_parent_path) {
                return parent;
            }
        }
        FullPath::new(sink_key).dir_and_name().0.to_string()
    }
}
