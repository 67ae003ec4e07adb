//! WolfMirror Error Types

use thiserror::Error;

/// Result type alias for WolfMirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfMirror error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    // Addressing errors
    #[error("Malformed chunk address {input:?}: {reason}")]
    MalformedAddress { input: String, reason: String },

    // Chunk transfer errors
    #[error("Fetch {file_id} failed: {reason}")]
    FetchFailed { file_id: String, reason: String },

    #[error("Assign volume under {parent_path} failed: {reason}")]
    AssignmentFailed { parent_path: String, reason: String },

    #[error("Upload to {url} failed: {reason}")]
    UploadFailed { url: String, reason: String },

    #[error("Copy chunk {file_id} failed: {source}")]
    ChunkCopy {
        file_id: String,
        #[source]
        source: Box<Error>,
    },

    // Metadata service errors
    #[error("{operation} {key}: {message}")]
    Application {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Replicate {key} failed: {source}")]
    Replication {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Unknown sink kind: {0}")]
    UnknownSink(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Encoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Check if retrying the whole reconciliation call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ConnectionTimeout(_)
            | Error::ConnectionFailed { .. }
            | Error::Network(_)
            | Error::Http(_)
            | Error::FetchFailed { .. }
            | Error::AssignmentFailed { .. }
            | Error::UploadFailed { .. }
            | Error::Application { .. }
            | Error::Cancelled => true,
            Error::ChunkCopy { source, .. } | Error::Replication { source, .. } => {
                source.is_retryable()
            }
            _ => false,
        }
    }

    /// Wrap this error with the entry key it was raised for
    pub fn for_key(self, key: &str) -> Self {
        match self {
            Error::Replication { .. } | Error::Cancelled | Error::NotFound(_) => self,
            other => Error::Replication {
                key: key.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, skipping context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::ChunkCopy { source, .. } | Error::Replication { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_context() {
        let err = Error::AssignmentFailed {
            parent_path: "/data".into(),
            reason: "no free volumes".into(),
        };
        let wrapped = Error::ChunkCopy {
            file_id: "3,01637037d6".into(),
            source: Box::new(err),
        }
        .for_key("/data/a.txt");

        assert!(matches!(wrapped, Error::Replication { .. }));
        assert!(matches!(wrapped.root(), Error::AssignmentFailed { .. }));
        assert!(wrapped.is_retryable());
        assert!(wrapped.to_string().contains("/data/a.txt"));
    }

    #[test]
    fn test_not_found_keeps_identity() {
        let err = Error::NotFound("/a/b".into()).for_key("/a/b");
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!err.is_retryable());
    }
}
