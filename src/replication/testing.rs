//! In-memory collaborators for exercising the reconciliation engine

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::source::{ByteStream, ChunkSource, SourcePart};
use super::upload::{ChunkUploader, UploadRequest, UploadResult};
use crate::error::{Error, Result};
use crate::filer::*;
use crate::storage::FileId;

/// Filer that keeps entries in a map and counts every call
pub struct FakeFiler {
    address: String,
    entries: Mutex<HashMap<String, Entry>>,
    locations: Mutex<HashMap<String, Vec<Location>>>,
    deletes: Mutex<Vec<DeleteEntryRequest>>,
    next_key: AtomicU64,
    lookups: AtomicUsize,
    writes: AtomicUsize,
    assigns: AtomicUsize,
    fail_assign_on: Mutex<Option<usize>>,
    fail_lookups: AtomicBool,
    reject_writes: Mutex<Option<String>>,
}

impl FakeFiler {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            entries: Mutex::new(HashMap::new()),
            locations: Mutex::new(HashMap::new()),
            deletes: Mutex::new(Vec::new()),
            next_key: AtomicU64::new(0x100),
            lookups: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            assigns: AtomicUsize::new(0),
            fail_assign_on: Mutex::new(None),
            fail_lookups: AtomicBool::new(false),
            reject_writes: Mutex::new(None),
        }
    }

    /// Store an entry under its full path, bypassing the write counter
    pub fn put(&self, key: &str, entry: Entry) {
        self.entries.lock().unwrap().insert(key.to_string(), entry);
    }

    pub fn get(&self, key: &str) -> Option<Entry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn set_locations(&self, volume_id: &str, locations: Vec<Location>) {
        self.locations
            .lock()
            .unwrap()
            .insert(volume_id.to_string(), locations);
    }

    /// Make the n-th assignment (1-based) answer with an error
    pub fn fail_assign_on(&self, call: usize) {
        *self.fail_assign_on.lock().unwrap() = Some(call);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Answer every create, update and delete with `message`, storing nothing
    pub fn reject_writes_with(&self, message: &str) {
        *self.reject_writes.lock().unwrap() = Some(message.to_string());
    }

    fn rejection(&self) -> String {
        self.reject_writes.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Create, update and delete calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn assigns(&self) -> usize {
        self.assigns.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> Vec<DeleteEntryRequest> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FilerClient for FakeFiler {
    fn address(&self) -> &str {
        &self.address
    }

    async fn lookup_directory_entry(&self, request: LookupEntryRequest) -> Result<Option<Entry>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::Network("lookup refused".into()));
        }
        let key = FullPath::join(&request.directory, &request.name);
        Ok(self.get(key.as_str()))
    }

    async fn create_entry(&self, request: CreateEntryRequest) -> Result<CreateEntryResponse> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let error = self.rejection();
        if !error.is_empty() {
            return Ok(CreateEntryResponse { error });
        }
        let key = FullPath::join(&request.directory, &request.entry.name);
        let mut entries = self.entries.lock().unwrap();
        if request.o_excl && entries.contains_key(key.as_str()) {
            return Ok(CreateEntryResponse {
                error: format!("{} already exists", key),
            });
        }
        entries.insert(key.as_str().to_string(), request.entry);
        Ok(CreateEntryResponse::default())
    }

    async fn update_entry(&self, request: UpdateEntryRequest) -> Result<UpdateEntryResponse> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let error = self.rejection();
        if !error.is_empty() {
            return Ok(UpdateEntryResponse { error });
        }
        let key = FullPath::join(&request.directory, &request.entry.name);
        self.put(key.as_str(), request.entry);
        Ok(UpdateEntryResponse::default())
    }

    async fn delete_entry(&self, request: DeleteEntryRequest) -> Result<DeleteEntryResponse> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let error = self.rejection();
        if !error.is_empty() {
            return Ok(DeleteEntryResponse { error });
        }
        let key = FullPath::join(&request.directory, &request.name);
        let prefix = format!("{}/", key);
        {
            let mut entries = self.entries.lock().unwrap();
            entries.remove(key.as_str());
            if request.is_recursive {
                entries.retain(|path, _| !path.starts_with(&prefix));
            }
        }
        self.deletes.lock().unwrap().push(request);
        Ok(DeleteEntryResponse::default())
    }

    async fn assign_volume(&self, request: AssignVolumeRequest) -> Result<AssignVolumeResponse> {
        let call = self.assigns.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_assign_on.lock().unwrap() == Some(call) {
            return Ok(AssignVolumeResponse {
                error: format!("no writable volumes under {}", request.parent_path),
                ..Default::default()
            });
        }

        let key = self.next_key.fetch_add(1, Ordering::SeqCst);
        Ok(AssignVolumeResponse {
            file_id: FileId::new(9, key, 0x1234abcd).to_string(),
            url: "127.0.0.1:8080".into(),
            public_url: "127.0.0.1:8080".into(),
            count: request.count,
            auth: "jwt".into(),
            error: String::new(),
        })
    }

    async fn lookup_volume(&self, request: LookupVolumeRequest) -> Result<LookupVolumeResponse> {
        let locations = self.locations.lock().unwrap();
        let locations_map = request
            .volume_ids
            .iter()
            .filter_map(|vid| locations.get(vid).map(|l| (vid.clone(), l.clone())))
            .collect();
        Ok(LookupVolumeResponse { locations_map })
    }

    async fn get_filer_configuration(&self) -> Result<GetFilerConfigurationResponse> {
        Ok(GetFilerConfigurationResponse {
            masters: vec!["127.0.0.1:9333".into()],
            replication: "000".into(),
            collection: String::new(),
            max_mb: 4,
        })
    }
}

/// Decrements the open count when the stream it travels with is dropped
struct Tracked {
    inner: ByteStream,
    open: Arc<AtomicUsize>,
}

impl Stream for Tracked {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Source that serves the chunk address itself as content
#[derive(Default)]
pub struct FakeSource {
    reads: AtomicUsize,
    open: Arc<AtomicUsize>,
    missing: Mutex<HashSet<String>>,
    hang: AtomicBool,
    gzipped: AtomicBool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet dropped
    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn remove(&self, file_id: &str) {
        self.missing.lock().unwrap().insert(file_id.to_string());
    }

    /// Never complete a read
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn serve_gzipped(&self) {
        self.gzipped.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChunkSource for FakeSource {
    async fn read_part(&self, file_id: &str) -> Result<SourcePart> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.missing.lock().unwrap().contains(file_id) {
            return Err(Error::NotFound(file_id.to_string()));
        }

        let mut part = SourcePart::from_bytes(
            format!("{}.dat", file_id),
            "application/octet-stream",
            file_id.as_bytes().to_vec(),
        );
        if self.gzipped.load(Ordering::SeqCst) {
            part.content_encoding = "gzip".into();
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        part.body = Tracked {
            inner: part.body,
            open: self.open.clone(),
        }
        .boxed();
        Ok(part)
    }
}

/// What a [`FakeUploader`] received for one upload
#[derive(Debug, Clone)]
pub struct Uploaded {
    pub url: String,
    pub filename: String,
    pub is_gzipped: bool,
    pub mime_type: String,
    pub auth: String,
    pub data: Vec<u8>,
}

/// Uploader that drains bodies into memory
#[derive(Default)]
pub struct FakeUploader {
    uploads: Mutex<Vec<Uploaded>>,
    reject_with: Mutex<Option<String>>,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<Uploaded> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn reject_with(&self, error: &str) {
        *self.reject_with.lock().unwrap() = Some(error.to_string());
    }
}

#[async_trait]
impl ChunkUploader for FakeUploader {
    async fn upload(&self, mut request: UploadRequest) -> Result<UploadResult> {
        let mut data = Vec::new();
        while let Some(chunk) = request.body.next().await {
            data.extend_from_slice(&chunk?);
        }

        if let Some(error) = self.reject_with.lock().unwrap().clone() {
            return Ok(UploadResult {
                error,
                ..Default::default()
            });
        }

        let result = UploadResult {
            name: request.filename.clone(),
            size: data.len() as u64,
            e_tag: format!("{:08x}", crc32fast::hash(&data)),
            error: String::new(),
        };
        self.uploads.lock().unwrap().push(Uploaded {
            url: request.url,
            filename: request.filename,
            is_gzipped: request.is_gzipped,
            mime_type: request.mime_type,
            auth: request.auth,
            data,
        });
        Ok(result)
    }
}
