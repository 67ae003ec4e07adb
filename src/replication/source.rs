//! Chunk Sources
//!
//! Read side of a chunk copy: resolve a chunk address on the source
//! cluster and stream its content.

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{self, HeaderMap};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::filer::{FilerClient, LookupVolumeRequest};
use crate::storage::volume_id_of;

/// Chunk content as it arrives from a volume server
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// An opened chunk, ready to be streamed elsewhere
pub struct SourcePart {
    /// Logical file name the volume server reported
    pub filename: String,
    pub content_type: String,
    pub content_encoding: String,
    pub body: ByteStream,
}

impl SourcePart {
    /// Part backed by an in-memory buffer
    pub fn from_bytes(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data: Bytes = data.into();
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content_encoding: String::new(),
            body: stream::iter(vec![Ok(data)]).boxed(),
        }
    }

    /// Content is stored gzip-compressed and must be uploaded as such
    pub fn is_gzipped(&self) -> bool {
        self.content_encoding.eq_ignore_ascii_case("gzip")
    }
}

impl fmt::Debug for SourcePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourcePart")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_encoding", &self.content_encoding)
            .finish_non_exhaustive()
    }
}

/// Content fetch interface keyed by chunk address
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn read_part(&self, file_id: &str) -> Result<SourcePart>;
}

/// Reads chunks from the volume servers behind a source filer
pub struct FilerSource {
    filer: Arc<dyn FilerClient>,
    http: reqwest::Client,
}

impl FilerSource {
    pub fn new(filer: Arc<dyn FilerClient>, http: reqwest::Client) -> Self {
        Self { filer, http }
    }

    /// Volume server addresses currently holding `file_id`
    pub async fn lookup_file_id(&self, file_id: &str) -> Result<Vec<String>> {
        let vid = volume_id_of(file_id);
        let resp = self
            .filer
            .lookup_volume(LookupVolumeRequest {
                volume_ids: vec![vid.to_string()],
            })
            .await?;

        let urls: Vec<String> = resp
            .locations_map
            .get(vid)
            .map(|locations| locations.iter().map(|l| l.url.clone()).collect())
            .unwrap_or_default();

        if urls.is_empty() {
            return Err(Error::NotFound(format!("volume {} has no locations", vid)));
        }
        Ok(urls)
    }

    async fn get(&self, url: &str) -> Result<SourcePart> {
        let response = self
            .http
            .get(url)
            .header(header::ACCEPT_ENCODING, "gzip")
            .send()
            .await?
            .error_for_status()?;

        let headers = response.headers();
        let filename = header_str(headers, header::CONTENT_DISPOSITION)
            .and_then(disposition_filename)
            .unwrap_or_default();
        let content_type = header_str(headers, header::CONTENT_TYPE)
            .unwrap_or_default()
            .to_string();
        let content_encoding = header_str(headers, header::CONTENT_ENCODING)
            .unwrap_or_default()
            .to_string();

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .boxed();

        Ok(SourcePart {
            filename,
            content_type,
            content_encoding,
            body,
        })
    }
}

#[async_trait]
impl ChunkSource for FilerSource {
    async fn read_part(&self, file_id: &str) -> Result<SourcePart> {
        let mut last_error = Error::NotFound(file_id.to_string());

        for location in self.lookup_file_id(file_id).await? {
            let url = format!("http://{}/{}", location, file_id);
            debug!("Reading {}", url);
            match self.get(&url).await {
                Ok(part) => return Ok(part),
                Err(e) => {
                    warn!("Read {} failed: {}", url, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Extract `filename` from a Content-Disposition value
fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .find(|name| !name.is_empty())
}
