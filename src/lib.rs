//! WolfMirror - Filer Cross-Cluster Replication
//!
//! Keeps a directory tree of one filer cluster mirrored into another. Each
//! metadata event observed on the source is reconciled against the
//! destination: entries are created, updated or deleted, and any chunk the
//! destination does not hold yet is fetched from a source volume server and
//! uploaded to a freshly assigned destination volume.
//!
//! # Architecture
//!
//! - [`storage`] addresses chunks (`volume,key+cookie`) and reads volume
//!   index files.
//! - [`filer`] models entries and chunk lists, and talks to filers over the
//!   framed TCP protocol in [`network`].
//! - [`replication`] holds the [`replication::Replicator`], the sink
//!   registry, and the chunk fetch/upload pipeline.

pub mod config;
pub mod error;
pub mod filer;
pub mod network;
pub mod replication;
pub mod storage;

pub use config::WolfMirrorConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfMirrorConfig;
    pub use crate::error::{Error, Result};
    pub use crate::filer::{Entry, FileChunk, FilerClient, FullPath, RemoteFilerClient};
    pub use crate::replication::{ReplicationEvent, ReplicationSink, Replicator, SinkRegistry};
    pub use crate::storage::FileId;
}
