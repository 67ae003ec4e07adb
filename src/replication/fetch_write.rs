//! Chunk Transfer
//!
//! Copies chunks from the source cluster to volume servers assigned by the
//! destination filer. Each chunk is fetched, assigned, uploaded and
//! re-addressed independently; a batch succeeds only if every chunk does.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cancellable;
use super::source::ChunkSource;
use super::upload::{ChunkUploader, UploadRequest};
use crate::error::{Error, Result};
use crate::filer::{AssignVolumeRequest, FileChunk, FilerClient};

/// Placement applied to every chunk written at the destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSettings {
    pub replication: String,
    pub collection: String,
    pub ttl_sec: i32,
    pub data_center: String,
    /// Upload to volume servers over https
    pub use_https: bool,
}

/// Moves chunk content between clusters
pub struct ChunkTransfer {
    filer: Arc<dyn FilerClient>,
    source: Arc<dyn ChunkSource>,
    uploader: Arc<dyn ChunkUploader>,
    settings: TransferSettings,
    limiter: Option<Arc<Semaphore>>,
}

impl ChunkTransfer {
    /// `filer` is the destination filer that hands out chunk addresses
    pub fn new(
        filer: Arc<dyn FilerClient>,
        source: Arc<dyn ChunkSource>,
        uploader: Arc<dyn ChunkUploader>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            filer,
            source,
            uploader,
            settings,
            limiter: None,
        }
    }

    /// Cap simultaneous chunk copies; 0 leaves them unbounded
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limiter = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Copy every chunk concurrently
    ///
    /// All copies run to completion. The first failure in input order is
    /// returned, and no chunk list is produced unless every copy succeeded.
    pub async fn replicate_chunks(
        &self,
        ctx: &CancellationToken,
        chunks: &[FileChunk],
        dir: &str,
    ) -> Result<Vec<FileChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let results = join_all(
            chunks
                .iter()
                .map(|chunk| self.replicate_one_chunk(ctx, chunk, dir)),
        )
        .await;

        results.into_iter().collect()
    }

    /// Copy one chunk and describe its new location
    pub async fn replicate_one_chunk(
        &self,
        ctx: &CancellationToken,
        chunk: &FileChunk,
        dir: &str,
    ) -> Result<FileChunk> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(
                cancellable(ctx, async {
                    limiter.acquire().await.map_err(|_| Error::Cancelled)
                })
                .await?,
            ),
            None => None,
        };

        let source_file_id = chunk.address().into_owned();
        let file_id = cancellable(ctx, self.fetch_and_write(&source_file_id, dir))
            .await
            .map_err(|e| match e {
                Error::Cancelled => Error::Cancelled,
                other => Error::ChunkCopy {
                    file_id: source_file_id.clone(),
                    source: Box::new(other),
                },
            })?;

        Ok(FileChunk {
            file_id,
            offset: chunk.offset,
            size: chunk.size,
            mtime: chunk.mtime,
            e_tag: chunk.e_tag.clone(),
            source_file_id,
            ..Default::default()
        })
    }

    /// Fetch, assign and upload; returns the new chunk address
    async fn fetch_and_write(&self, source_file_id: &str, dir: &str) -> Result<String> {
        let part = self
            .source
            .read_part(source_file_id)
            .await
            .map_err(|e| Error::FetchFailed {
                file_id: source_file_id.to_string(),
                reason: e.to_string(),
            })?;

        let request = AssignVolumeRequest {
            count: 1,
            replication: self.settings.replication.clone(),
            collection: self.settings.collection.clone(),
            ttl_sec: self.settings.ttl_sec,
            data_center: self.settings.data_center.clone(),
            parent_path: dir.to_string(),
        };
        let assigned = match self.filer.assign_volume(request).await {
            Ok(resp) if resp.error.is_empty() => resp,
            Ok(resp) => {
                warn!("Assign volume under {} failed: {}", dir, resp.error);
                return Err(Error::AssignmentFailed {
                    parent_path: dir.to_string(),
                    reason: resp.error,
                });
            }
            Err(e) => {
                warn!("Assign volume under {} failed: {}", dir, e);
                return Err(Error::AssignmentFailed {
                    parent_path: dir.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let scheme = if self.settings.use_https { "https" } else { "http" };
        let url = format!("{}://{}/{}", scheme, assigned.url, assigned.file_id);
        debug!(
            "Replicating {} ({}) to {}",
            source_file_id, part.filename, url
        );

        let is_gzipped = part.is_gzipped();
        let upload = UploadRequest {
            url: url.clone(),
            filename: part.filename,
            body: part.body,
            is_gzipped,
            mime_type: part.content_type,
            auth: assigned.auth,
        };

        let result = self.uploader.upload(upload).await.map_err(|e| {
            warn!("Upload {} to {} failed: {}", source_file_id, url, e);
            Error::UploadFailed {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;
        if !result.error.is_empty() {
            warn!("Upload {} to {} rejected: {}", source_file_id, url, result.error);
            return Err(Error::UploadFailed {
                url,
                reason: result.error,
            });
        }

        Ok(assigned.file_id)
    }
}
