//! Chunk Upload
//!
//! Write side of a chunk copy: post chunk content to the volume server a
//! filer assigned.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_ENCODING};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::source::ByteStream;
use crate::error::{Error, Result};

/// In-flight buffers between the source stream and the upload body
const UPLOAD_BUFFER_CHUNKS: usize = 4;

/// One chunk to post to a volume server
pub struct UploadRequest {
    /// Full URL including the assigned file id
    pub url: String,
    pub filename: String,
    pub body: ByteStream,
    /// Body is already gzip-compressed
    pub is_gzipped: bool,
    pub mime_type: String,
    /// Write token from the assignment, empty when unsecured
    pub auth: String,
}

/// Volume server reply to an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadResult {
    pub name: String,
    pub size: u64,
    #[serde(rename = "eTag")]
    pub e_tag: String,
    pub error: String,
}

#[async_trait]
pub trait ChunkUploader: Send + Sync {
    /// Post the body; a transport failure is `Err`, a rejected upload comes
    /// back in `UploadResult::error`
    async fn upload(&self, request: UploadRequest) -> Result<UploadResult>;
}

/// Multipart uploader speaking the volume server HTTP API
pub struct HttpUploader {
    http: reqwest::Client,
}

impl HttpUploader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Copy the source stream into the upload channel until either side stops
async fn forward(mut body: ByteStream, tx: mpsc::Sender<io::Result<Bytes>>) {
    while let Some(item) = body.next().await {
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            break;
        }
    }
}

#[async_trait]
impl ChunkUploader for HttpUploader {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResult> {
        let UploadRequest {
            url,
            filename,
            body,
            is_gzipped,
            mime_type,
            auth,
        } = request;

        let (tx, rx) = mpsc::channel(UPLOAD_BUFFER_CHUNKS);
        tokio::spawn(forward(body, tx));

        let mut part = Part::stream(reqwest::Body::wrap_stream(ReceiverStream::new(rx)))
            .file_name(filename);
        if !mime_type.is_empty() {
            part = part.mime_str(&mime_type)?;
        }
        if is_gzipped {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            part = part.headers(headers);
        }

        let mut builder = self.http.post(&url).multipart(Form::new().part("file", part));
        if !auth.is_empty() {
            builder = builder.header(AUTHORIZATION, format!("BEARER {}", auth));
        }

        debug!("Uploading to {} (gzip: {})", url, is_gzipped);
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<UploadResult>(&text) {
            Ok(mut result) => {
                if !status.is_success() && result.error.is_empty() {
                    result.error = format!("status {}", status);
                }
                Ok(result)
            }
            Err(_) if !status.is_success() => Ok(UploadResult {
                error: format!("status {}: {}", status, text.trim()),
                ..Default::default()
            }),
            Err(e) => Err(Error::Network(format!(
                "Unreadable upload reply from {}: {}",
                url, e
            ))),
        }
    }
}
