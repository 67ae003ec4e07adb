//! Filer Wire Protocol
//!
//! Request/response messages exchanged with a filer over framed TCP.

use serde::{Deserialize, Serialize};

use crate::filer::{
    AssignVolumeRequest, AssignVolumeResponse, CreateEntryRequest, CreateEntryResponse,
    DeleteEntryRequest, DeleteEntryResponse, Entry, GetFilerConfigurationResponse,
    LookupEntryRequest, LookupVolumeRequest, LookupVolumeResponse, UpdateEntryRequest,
    UpdateEntryResponse,
};

/// Upper bound on a single frame body
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Requests sent to a filer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FilerRequest {
    LookupDirectoryEntry(LookupEntryRequest),
    CreateEntry(CreateEntryRequest),
    UpdateEntry(UpdateEntryRequest),
    DeleteEntry(DeleteEntryRequest),
    AssignVolume(AssignVolumeRequest),
    LookupVolume(LookupVolumeRequest),
    GetFilerConfiguration,
}

/// Replies from a filer, one per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FilerResponse {
    LookupDirectoryEntry { entry: Option<Entry> },
    CreateEntry(CreateEntryResponse),
    UpdateEntry(UpdateEntryResponse),
    DeleteEntry(DeleteEntryResponse),
    AssignVolume(AssignVolumeResponse),
    LookupVolume(LookupVolumeResponse),
    GetFilerConfiguration(GetFilerConfigurationResponse),

    /// The filer could not process the request at all
    Error { code: ErrorCode, message: String },
}

/// Error codes for requests the filer rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Request could not be decoded
    BadRequest,
    /// Filer is shutting down or overloaded
    Unavailable,
    Internal,
}

impl FilerRequest {
    /// Get the request type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            FilerRequest::LookupDirectoryEntry(_) => "LookupDirectoryEntry",
            FilerRequest::CreateEntry(_) => "CreateEntry",
            FilerRequest::UpdateEntry(_) => "UpdateEntry",
            FilerRequest::DeleteEntry(_) => "DeleteEntry",
            FilerRequest::AssignVolume(_) => "AssignVolume",
            FilerRequest::LookupVolume(_) => "LookupVolume",
            FilerRequest::GetFilerConfiguration => "GetFilerConfiguration",
        }
    }
}

impl FilerResponse {
    pub fn type_name(&self) -> &'static str {
        match self {
            FilerResponse::LookupDirectoryEntry { .. } => "LookupDirectoryEntry",
            FilerResponse::CreateEntry(_) => "CreateEntry",
            FilerResponse::UpdateEntry(_) => "UpdateEntry",
            FilerResponse::DeleteEntry(_) => "DeleteEntry",
            FilerResponse::AssignVolume(_) => "AssignVolume",
            FilerResponse::LookupVolume(_) => "LookupVolume",
            FilerResponse::GetFilerConfiguration(_) => "GetFilerConfiguration",
            FilerResponse::Error { .. } => "Error",
        }
    }
}

/// Frame header for length-prefixed messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Body length in bytes
    pub length: u32,
    /// crc32 of the body
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    pub fn new(body: &[u8]) -> Self {
        Self {
            length: body.len() as u32,
            checksum: crc32fast::hash(body),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let [l0, l1, l2, l3, c0, c1, c2, c3] = *bytes;
        Self {
            length: u32::from_le_bytes([l0, l1, l2, l3]),
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
        }
    }

    /// Check a received body against this header
    pub fn verify(&self, body: &[u8]) -> bool {
        body.len() == self.length as usize && crc32fast::hash(body) == self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filer::FileChunk;

    #[test]
    fn test_request_bincode() {
        let request = FilerRequest::CreateEntry(CreateEntryRequest {
            directory: "/backup".into(),
            entry: Entry {
                name: "a.txt".into(),
                chunks: vec![FileChunk {
                    file_id: "3,01637037d6".into(),
                    size: 10,
                    ..Default::default()
                }],
                ..Default::default()
            },
            o_excl: false,
        });

        let bytes = bincode::serialize(&request).unwrap();
        let decoded: FilerRequest = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.type_name(), "CreateEntry");
        match decoded {
            FilerRequest::CreateEntry(req) => {
                assert_eq!(req.directory, "/backup");
                assert_eq!(req.entry.chunks[0].file_id, "3,01637037d6");
            }
            other => panic!("unexpected request {}", other.type_name()),
        }
    }

    #[test]
    fn test_frame_header() {
        let body = b"filer frame";
        let header = FrameHeader::new(body);
        let restored = FrameHeader::from_bytes(&header.to_bytes());

        assert_eq!(header, restored);
        assert!(restored.verify(body));
        assert!(!restored.verify(b"filer frAme"));
    }
}
