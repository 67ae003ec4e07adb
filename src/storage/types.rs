//! Volume Storage Types
//!
//! Fixed-width identifiers and the on-disk index record layout shared by
//! the index scanner and the chunk address codec.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

/// Per-volume sequence key of a stored needle
pub type NeedleId = u64;

/// Random value guarding a needle against address guessing
pub type Cookie = u32;

/// Storage volume identifier
pub type VolumeId = u32;

pub const NEEDLE_ID_SIZE: usize = 8;
pub const COOKIE_SIZE: usize = 4;
pub const OFFSET_SIZE: usize = 4;
pub const SIZE_SIZE: usize = 4;

/// Width of one index record: key || offset || size
pub const NEEDLE_MAP_ENTRY_SIZE: usize = NEEDLE_ID_SIZE + OFFSET_SIZE + SIZE_SIZE;

/// Needles are aligned to this many bytes inside a volume data file
pub const NEEDLE_PADDING_SIZE: u64 = 8;

/// Size value written to the index when a needle is deleted
pub const TOMBSTONE_FILE_SIZE: u32 = u32::MAX;

/// Needle offset inside a volume data file, stored in padding units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset(pub u32);

impl Offset {
    /// Build from a byte position; the position must be padding-aligned
    pub fn from_actual_offset(actual: u64) -> Self {
        Self((actual / NEEDLE_PADDING_SIZE) as u32)
    }

    /// Byte position inside the data file
    pub fn to_actual_offset(self) -> u64 {
        self.0 as u64 * NEEDLE_PADDING_SIZE
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// One fixed-width record of an append-only index file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub key: NeedleId,
    pub offset: Offset,
    pub size: u32,
}

impl IndexRecord {
    pub const SIZE: usize = NEEDLE_MAP_ENTRY_SIZE;

    pub fn new(key: NeedleId, offset: Offset, size: u32) -> Self {
        Self { key, offset, size }
    }

    /// Serialize the record in network byte order
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        BigEndian::write_u64(&mut bytes[0..NEEDLE_ID_SIZE], self.key);
        BigEndian::write_u32(
            &mut bytes[NEEDLE_ID_SIZE..NEEDLE_ID_SIZE + OFFSET_SIZE],
            self.offset.0,
        );
        BigEndian::write_u32(&mut bytes[NEEDLE_ID_SIZE + OFFSET_SIZE..], self.size);
        bytes
    }

    /// Decode a record; `bytes` must hold at least `IndexRecord::SIZE` bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= Self::SIZE);
        Self {
            key: BigEndian::read_u64(&bytes[0..NEEDLE_ID_SIZE]),
            offset: Offset(BigEndian::read_u32(
                &bytes[NEEDLE_ID_SIZE..NEEDLE_ID_SIZE + OFFSET_SIZE],
            )),
            size: BigEndian::read_u32(
                &bytes[NEEDLE_ID_SIZE + OFFSET_SIZE..NEEDLE_MAP_ENTRY_SIZE],
            ),
        }
    }

    /// Whether this record marks its key as removed
    pub fn is_deletion(&self) -> bool {
        self.offset.is_zero() || self.size == TOMBSTONE_FILE_SIZE
    }
}
