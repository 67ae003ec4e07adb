//! Filer Module
//!
//! Metadata model, chunk set algebra and the client interface to filer
//! services.

pub mod chunks;
mod client;
pub mod codec;
mod entry;
mod remote;

pub use chunks::{compare_chunks, etag, minus_chunks, total_size};
pub use client::{
    check_response, AssignVolumeRequest, AssignVolumeResponse, CreateEntryRequest,
    CreateEntryResponse, DeleteEntryRequest, DeleteEntryResponse, FilerClient,
    GetFilerConfigurationResponse, Location, LookupEntryRequest, LookupVolumeRequest,
    LookupVolumeResponse, UpdateEntryRequest, UpdateEntryResponse,
};
pub use codec::{after_entry_deserialization, before_entry_serialization};
pub use entry::{Entry, FileChunk, FullPath, FuseAttributes};
pub use remote::RemoteFilerClient;
