//! Filer Client Interface
//!
//! Request and response records for the metadata service, and the trait
//! the reconciliation engine drives them through.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::entry::Entry;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupEntryRequest {
    pub directory: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub directory: String,
    pub entry: Entry,
    /// Fail instead of overwriting an existing entry
    pub o_excl: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEntryResponse {
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    pub directory: String,
    pub entry: Entry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntryResponse {
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteEntryRequest {
    pub directory: String,
    pub name: String,
    pub is_delete_data: bool,
    pub is_recursive: bool,
    pub ignore_recursive_error: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteEntryResponse {
    pub error: String,
}

/// Ask the filer for a fresh chunk address on a volume server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignVolumeRequest {
    pub count: u32,
    pub collection: String,
    pub replication: String,
    pub ttl_sec: i32,
    pub data_center: String,
    pub parent_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignVolumeResponse {
    pub file_id: String,
    /// Volume server the chunk must be uploaded to
    pub url: String,
    pub public_url: String,
    pub count: u32,
    /// Write token for the volume server, empty when unsecured
    pub auth: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupVolumeRequest {
    pub volume_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub url: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupVolumeResponse {
    /// Volume id -> servers holding it
    pub locations_map: HashMap<String, Vec<Location>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetFilerConfigurationResponse {
    pub masters: Vec<String>,
    pub replication: String,
    pub collection: String,
    pub max_mb: u32,
}

/// Metadata service operations
///
/// Implementations report transport failures as `Err`. Application-level
/// failures come back in the response's `error` field and are checked by
/// the caller with [`check_response`].
#[async_trait]
pub trait FilerClient: Send + Sync {
    /// Address of the filer this client talks to
    fn address(&self) -> &str;

    /// Look up one entry; `Ok(None)` when it does not exist
    async fn lookup_directory_entry(&self, request: LookupEntryRequest) -> Result<Option<Entry>>;

    async fn create_entry(&self, request: CreateEntryRequest) -> Result<CreateEntryResponse>;

    async fn update_entry(&self, request: UpdateEntryRequest) -> Result<UpdateEntryResponse>;

    async fn delete_entry(&self, request: DeleteEntryRequest) -> Result<DeleteEntryResponse>;

    async fn assign_volume(&self, request: AssignVolumeRequest) -> Result<AssignVolumeResponse>;

    async fn lookup_volume(&self, request: LookupVolumeRequest) -> Result<LookupVolumeResponse>;

    async fn get_filer_configuration(&self) -> Result<GetFilerConfigurationResponse>;
}

/// Turn a non-empty application error into `Error::Application`
pub fn check_response(operation: &'static str, key: &str, error: &str) -> Result<()> {
    if error.is_empty() {
        return Ok(());
    }
    Err(Error::Application {
        operation,
        key: key.to_string(),
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_response() {
        assert!(check_response("create entry", "/a", "").is_ok());

        let err = check_response("create entry", "/a", "disk full").unwrap_err();
        match err {
            Error::Application {
                operation,
                key,
                message,
            } => {
                assert_eq!(operation, "create entry");
                assert_eq!(key, "/a");
                assert_eq!(message, "disk full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
