//! Wire-form normalization of chunk addresses
//!
//! Entries travel with binary addresses to keep messages small; local
//! consumers index chunks by the string form. Both passes are idempotent.

use super::entry::FileChunk;
use crate::storage::FileId;

/// Move string addresses into their binary fields before sending
///
/// Strings that fail to parse are left in place.
pub fn before_entry_serialization(chunks: &mut [FileChunk]) {
    for chunk in chunks.iter_mut() {
        if !chunk.file_id.is_empty() {
            if let Ok(fid) = chunk.file_id.parse::<FileId>() {
                chunk.fid = Some(fid);
                chunk.file_id.clear();
            }
        }

        if !chunk.source_file_id.is_empty() {
            if let Ok(fid) = chunk.source_file_id.parse::<FileId>() {
                chunk.source_fid = Some(fid);
                chunk.source_file_id.clear();
            }
        }
    }
}

/// Fill in string addresses from binary fields after receiving
pub fn after_entry_deserialization(chunks: &mut [FileChunk]) {
    for chunk in chunks.iter_mut() {
        if chunk.file_id.is_empty() {
            if let Some(fid) = &chunk.fid {
                chunk.file_id = fid.to_string();
            }
        }

        if chunk.source_file_id.is_empty() {
            if let Some(fid) = &chunk.source_fid {
                chunk.source_file_id = fid.to_string();
            }
        }
    }
}
