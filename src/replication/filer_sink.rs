//! Filer Sink
//!
//! Reconciles entries into a destination filer: copies the chunks that
//! changed and writes the resulting metadata. Create and update are safe to
//! repeat; an update older than the destination state is ignored.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancellable;
use super::fetch_write::{ChunkTransfer, TransferSettings};
use super::sink::{ReplicationSink, SinkContext};
use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::filer::{
    check_response, compare_chunks, etag, minus_chunks, CreateEntryRequest, DeleteEntryRequest,
    Entry, FilerClient, FullPath, LookupEntryRequest, RemoteFilerClient, UpdateEntryRequest,
};

/// Sink writing into another filer
pub struct FilerSink {
    filer: Arc<dyn FilerClient>,
    dir: String,
    transfer: ChunkTransfer,
}

impl FilerSink {
    pub fn new(filer: Arc<dyn FilerClient>, dir: impl Into<String>, transfer: ChunkTransfer) -> Self {
        Self {
            filer,
            dir: dir.into(),
            transfer,
        }
    }

    /// Registry constructor for the `filer` kind
    pub fn from_config(config: &SinkConfig, ctx: &SinkContext) -> Result<Arc<dyn ReplicationSink>> {
        let filer: Arc<dyn FilerClient> =
            Arc::new(RemoteFilerClient::new(config.filer.clone(), ctx.pool.clone()));
        let settings = TransferSettings {
            replication: config.replication.clone(),
            collection: config.collection.clone(),
            ttl_sec: config.ttl_sec,
            data_center: config.data_center.clone(),
            use_https: ctx.transfer.use_https,
        };
        let transfer = ChunkTransfer::new(
            filer.clone(),
            ctx.source.clone(),
            ctx.uploader.clone(),
            settings,
        )
        .with_max_concurrent(ctx.transfer.max_concurrent_transfers);

        Ok(Arc::new(Self::new(filer, config.directory.clone(), transfer)))
    }

    async fn lookup(&self, ctx: &CancellationToken, dir: &str, name: &str) -> Result<Option<Entry>> {
        debug!("Lookup {} in {}", name, dir);
        cancellable(
            ctx,
            self.filer.lookup_directory_entry(LookupEntryRequest {
                directory: dir.to_string(),
                name: name.to_string(),
            }),
        )
        .await
    }
}

#[async_trait]
impl ReplicationSink for FilerSink {
    fn name(&self) -> &'static str {
        "filer"
    }

    fn sink_to_directory(&self) -> &str {
        &self.dir
    }

    async fn create_entry(&self, ctx: &CancellationToken, key: &str, entry: &Entry) -> Result<()> {
        let path = FullPath::new(key);
        let (dir, name) = path.dir_and_name();

        match self.lookup(ctx, dir, name).await {
            Ok(Some(existing)) if etag(&existing.chunks) == etag(&entry.chunks) => {
                info!("Already replicated {}", key);
                return Ok(());
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => debug!("Lookup {} failed, creating anyway: {}", key, e),
            Ok(_) => {}
        }

        let chunks = self
            .transfer
            .replicate_chunks(ctx, &entry.chunks, dir)
            .await
            .map_err(|e| {
                warn!("Replicate chunks of {} failed: {}", key, e);
                e.for_key(key)
            })?;

        info!("Replicated {} ({} chunks)", key, chunks.len());

        let request = CreateEntryRequest {
            directory: dir.to_string(),
            entry: Entry {
                name: name.to_string(),
                is_directory: entry.is_directory,
                chunks,
                attributes: entry.attributes.clone(),
            },
            o_excl: false,
        };
        let resp = cancellable(ctx, self.filer.create_entry(request))
            .await
            .map_err(|e| e.for_key(key))?;
        check_response("create entry", key, &resp.error)
    }

    async fn update_entry(
        &self,
        ctx: &CancellationToken,
        key: &str,
        old_entry: &Entry,
        new_parent_path: &str,
        new_entry: &Entry,
        delete_chunks: bool,
    ) -> Result<()> {
        let path = FullPath::new(key);
        let (dir, name) = path.dir_and_name();

        let mut existing = match self.lookup(ctx, dir, name).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(Error::NotFound(key.to_string())),
            Err(e) => {
                warn!("Lookup {} failed: {}", key, e);
                return Err(e.for_key(key));
            }
        };

        if existing.mtime() > new_entry.mtime() {
            info!(
                "Late update of {} ignored ({} > {})",
                key,
                existing.mtime(),
                new_entry.mtime()
            );
            return Ok(());
        }

        if etag(&new_entry.chunks) == etag(&existing.chunks) {
            info!("Already replicated {}", key);
        } else {
            let (deleted, added) = compare_chunks(old_entry, new_entry);

            if delete_chunks {
                existing.chunks = minus_chunks(&existing.chunks, &deleted);
            }

            let replicated = self
                .transfer
                .replicate_chunks(ctx, &added, dir)
                .await
                .map_err(|e| {
                    warn!("Replicate chunks of {} failed: {}", key, e);
                    e.for_key(key)
                })?;
            info!(
                "Updated {}: {} chunks removed, {} added",
                key,
                if delete_chunks { deleted.len() } else { 0 },
                replicated.len()
            );
            existing.chunks.extend(replicated);
        }

        let request = UpdateEntryRequest {
            directory: new_parent_path.to_string(),
            entry: existing,
        };
        let resp = cancellable(ctx, self.filer.update_entry(request))
            .await
            .map_err(|e| e.for_key(key))?;
        check_response("update entry", key, &resp.error)
    }

    async fn delete_entry(
        &self,
        ctx: &CancellationToken,
        key: &str,
        is_directory: bool,
        delete_data: bool,
    ) -> Result<()> {
        let path = FullPath::new(key);
        let (dir, name) = path.dir_and_name();

        let request = DeleteEntryRequest {
            directory: dir.to_string(),
            name: name.to_string(),
            is_delete_data: delete_data,
            is_recursive: is_directory,
            ignore_recursive_error: false,
        };
        info!("Delete {} (data: {})", key, delete_data);

        let resp = cancellable(ctx, self.filer.delete_entry(request))
            .await
            .map_err(|e| {
                warn!("Delete {} failed: {}", key, e);
                e.for_key(key)
            })?;
        check_response("delete entry", key, &resp.error)
    }
}
