//! Volume Storage Module
//!
//! Chunk addressing and the append-only index file format used by
//! volume servers.

pub mod types;
mod file_id;
mod idx;
mod needle_map;

pub use file_id::{format_needle_id_cookie, parse_needle_id_cookie, volume_id_of, FileId};
pub use idx::{walk_index_file, walk_index_path, ReadAt, ROWS_TO_READ};
pub use needle_map::{NeedleMap, NeedleValue};
pub use types::{Cookie, IndexRecord, NeedleId, Offset, VolumeId};
