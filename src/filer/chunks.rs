//! Chunk set operations used to diff entry versions

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::entry::{Entry, FileChunk};

/// Chunks of `a` whose address does not appear in `b`, in `a`'s order
pub fn minus_chunks(a: &[FileChunk], b: &[FileChunk]) -> Vec<FileChunk> {
    let present: HashSet<_> = b.iter().map(|c| c.address()).collect();
    a.iter()
        .filter(|c| !present.contains(c.address().as_ref()))
        .cloned()
        .collect()
}

/// Order-sensitive fingerprint of a chunk list
///
/// A single chunk keeps its own e-tag. Longer lists hash every e-tag in
/// order and append the chunk count.
pub fn etag(chunks: &[FileChunk]) -> String {
    if chunks.len() == 1 {
        return chunks[0].e_tag.clone();
    }

    let mut hasher = Sha256::new();
    for chunk in chunks {
        let tag = chunk.e_tag.as_bytes();
        hasher.update((tag.len() as u32).to_be_bytes());
        hasher.update(tag);
    }
    format!("{}-{}", hex::encode(hasher.finalize()), chunks.len())
}

/// Split the change between two versions into (deleted, added) chunks
pub fn compare_chunks(old_entry: &Entry, new_entry: &Entry) -> (Vec<FileChunk>, Vec<FileChunk>) {
    let deleted = minus_chunks(&old_entry.chunks, &new_entry.chunks);
    let added = minus_chunks(&new_entry.chunks, &old_entry.chunks);
    (deleted, added)
}

/// Logical file size covered by a chunk list
pub fn total_size(chunks: &[FileChunk]) -> u64 {
    chunks
        .iter()
        .map(|c| c.offset.max(0) as u64 + c.size)
        .max()
        .unwrap_or(0)
}
