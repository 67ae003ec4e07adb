//! Remote filer client over the pooled TCP transport

use std::sync::Arc;

use async_trait::async_trait;

use super::client::*;
use super::codec::{after_entry_deserialization, before_entry_serialization};
use super::entry::Entry;
use crate::error::{Error, Result};
use crate::network::{FilerConnectionPool, FilerRequest, FilerResponse};

/// [`FilerClient`] for one filer address
pub struct RemoteFilerClient {
    address: String,
    pool: Arc<FilerConnectionPool>,
}

impl RemoteFilerClient {
    pub fn new(address: impl Into<String>, pool: Arc<FilerConnectionPool>) -> Self {
        Self {
            address: address.into(),
            pool,
        }
    }

    async fn call(&self, request: FilerRequest) -> Result<FilerResponse> {
        let expected = request.type_name();
        match self.pool.send(&self.address, &request).await? {
            FilerResponse::Error { code, message } => Err(Error::Network(format!(
                "{} rejected by {} ({:?}): {}",
                expected, self.address, code, message
            ))),
            response => Ok(response),
        }
    }

    fn unexpected(&self, expected: &str, response: FilerResponse) -> Error {
        Error::Network(format!(
            "Expected {} reply from {}, got {}",
            expected,
            self.address,
            response.type_name()
        ))
    }
}

fn outbound(mut entry: Entry) -> Entry {
    before_entry_serialization(&mut entry.chunks);
    entry
}

fn inbound(mut entry: Entry) -> Entry {
    after_entry_deserialization(&mut entry.chunks);
    entry
}

#[async_trait]
impl FilerClient for RemoteFilerClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn lookup_directory_entry(&self, request: LookupEntryRequest) -> Result<Option<Entry>> {
        match self.call(FilerRequest::LookupDirectoryEntry(request)).await? {
            FilerResponse::LookupDirectoryEntry { entry } => Ok(entry.map(inbound)),
            other => Err(self.unexpected("LookupDirectoryEntry", other)),
        }
    }

    async fn create_entry(&self, mut request: CreateEntryRequest) -> Result<CreateEntryResponse> {
        request.entry = outbound(request.entry);
        match self.call(FilerRequest::CreateEntry(request)).await? {
            FilerResponse::CreateEntry(resp) => Ok(resp),
            other => Err(self.unexpected("CreateEntry", other)),
        }
    }

    async fn update_entry(&self, mut request: UpdateEntryRequest) -> Result<UpdateEntryResponse> {
        request.entry = outbound(request.entry);
        match self.call(FilerRequest::UpdateEntry(request)).await? {
            FilerResponse::UpdateEntry(resp) => Ok(resp),
            other => Err(self.unexpected("UpdateEntry", other)),
        }
    }

    async fn delete_entry(&self, request: DeleteEntryRequest) -> Result<DeleteEntryResponse> {
        match self.call(FilerRequest::DeleteEntry(request)).await? {
            FilerResponse::DeleteEntry(resp) => Ok(resp),
            other => Err(self.unexpected("DeleteEntry", other)),
        }
    }

    async fn assign_volume(&self, request: AssignVolumeRequest) -> Result<AssignVolumeResponse> {
        match self.call(FilerRequest::AssignVolume(request)).await? {
            FilerResponse::AssignVolume(resp) => Ok(resp),
            other => Err(self.unexpected("AssignVolume", other)),
        }
    }

    async fn lookup_volume(&self, request: LookupVolumeRequest) -> Result<LookupVolumeResponse> {
        match self.call(FilerRequest::LookupVolume(request)).await? {
            FilerResponse::LookupVolume(resp) => Ok(resp),
            other => Err(self.unexpected("LookupVolume", other)),
        }
    }

    async fn get_filer_configuration(&self) -> Result<GetFilerConfigurationResponse> {
        match self.call(FilerRequest::GetFilerConfiguration).await? {
            FilerResponse::GetFilerConfiguration(resp) => Ok(resp),
            other => Err(self.unexpected("GetFilerConfiguration", other)),
        }
    }
}
