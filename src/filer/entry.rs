//! Filer Entry Types
//!
//! Metadata records exchanged with filer services: entries, their
//! attributes and the chunks that make up file content.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::FileId;

/// One contiguous piece of a file's content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChunk {
    /// String address; may be empty when only `fid` is populated
    pub file_id: String,
    /// Position of this chunk within the file
    pub offset: i64,
    pub size: u64,
    pub mtime: i64,
    /// Content fingerprint reported by the volume server
    pub e_tag: String,
    /// Address this chunk was copied from, if replicated
    pub source_file_id: String,
    /// Binary address; may be empty when only `file_id` is populated
    pub fid: Option<FileId>,
    pub source_fid: Option<FileId>,
}

impl FileChunk {
    /// String address, computed from the binary form when not cached
    pub fn address(&self) -> Cow<'_, str> {
        if !self.file_id.is_empty() {
            return Cow::Borrowed(&self.file_id);
        }
        match &self.fid {
            Some(fid) => Cow::Owned(fid.to_string()),
            None => Cow::Borrowed(""),
        }
    }

    /// String address, caching it on first computation
    ///
    /// A cached value is returned as-is even if `fid` changed afterwards.
    pub fn file_id_string(&mut self) -> &str {
        if self.file_id.is_empty() {
            if let Some(fid) = &self.fid {
                self.file_id = fid.to_string();
            }
        }
        &self.file_id
    }

    /// Provenance address, computed from the binary form when not cached
    pub fn source_address(&self) -> Cow<'_, str> {
        if !self.source_file_id.is_empty() {
            return Cow::Borrowed(&self.source_file_id);
        }
        match &self.source_fid {
            Some(fid) => Cow::Owned(fid.to_string()),
            None => Cow::Borrowed(""),
        }
    }
}

/// POSIX-ish attributes carried by an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseAttributes {
    pub file_size: u64,
    /// Modification time, seconds since the epoch
    pub mtime: i64,
    pub file_mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Creation time, seconds since the epoch
    pub crtime: i64,
    pub mime: String,
    pub replication: String,
    pub collection: String,
    pub ttl_sec: i32,
    pub user_name: String,
    pub group_names: Vec<String>,
    pub symlink_target: String,
}

/// A filesystem metadata record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    pub name: String,
    pub is_directory: bool,
    pub chunks: Vec<FileChunk>,
    pub attributes: FuseAttributes,
}

impl Entry {
    pub fn mtime(&self) -> i64 {
        self.attributes.mtime
    }
}

/// Absolute, slash-separated path of an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullPath(String);

impl FullPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Join a directory and a child name
    pub fn join(dir: &str, name: &str) -> Self {
        if dir.ends_with('/') {
            Self(format!("{}{}", dir, name))
        } else {
            Self(format!("{}/{}", dir, name))
        }
    }

    /// Split into parent directory and base name
    pub fn dir_and_name(&self) -> (&str, &str) {
        let path = self.0.as_str();
        if path == "/" {
            return ("/", "");
        }
        match path.rfind('/') {
            Some(0) => ("/", &path[1..]),
            Some(idx) => (&path[..idx], &path[idx + 1..]),
            None => ("/", path),
        }
    }

    pub fn name(&self) -> &str {
        self.dir_and_name().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FullPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}
