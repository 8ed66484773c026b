use std::fmt;
use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Failure while normalizing a raw asset record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Asset record is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Asset record field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Failure reported by the remote asset service or the transport to it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Cloudinary returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Result type for remote API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Which attribute a metadata lookup was serving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataAttribute {
    FileSize,
    MimeType,
    LastModified,
    Visibility,
    All,
}

impl fmt::Display for MetadataAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataAttribute::FileSize => "file_size",
            MetadataAttribute::MimeType => "mime_type",
            MetadataAttribute::LastModified => "last_modified",
            MetadataAttribute::Visibility => "visibility",
            MetadataAttribute::All => "metadata",
        };
        f.write_str(name)
    }
}

/// Main error type for adapter operations
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Invalid asset metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Unable to list contents under '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: ApiError,
    },

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Unable to write file at location: {path}")]
    UnableToWriteFile {
        path: String,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error("Unable to read file from location: {path}")]
    UnableToReadFile {
        path: String,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error("Unable to copy file from {from} to {to}")]
    UnableToCopyFile {
        from: String,
        to: String,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error("Unable to move file from {from} to {to}")]
    UnableToMoveFile {
        from: String,
        to: String,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error("Unable to delete file located at: {path}")]
    UnableToDeleteFile {
        path: String,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error("Unable to create directory at location: {path}")]
    UnableToCreateDirectory {
        path: String,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error("Unable to delete directory located at: {path}")]
    UnableToDeleteDirectory {
        path: String,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error("Unable to retrieve the {attribute} for file at location: {path}")]
    UnableToRetrieveMetadata {
        path: String,
        attribute: MetadataAttribute,
        #[source]
        cause: Box<AdapterError>,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AdapterError {
    /// True for a missing path, whether reported locally or by the service
    pub fn is_not_found(&self) -> bool {
        match self {
            AdapterError::NotFound(_) => true,
            AdapterError::Api(api) => api.is_not_found(),
            _ => false,
        }
    }

    /// The wrapped cause of an operation-specific failure, if any
    pub fn cause(&self) -> Option<&AdapterError> {
        match self {
            AdapterError::UnableToWriteFile { cause, .. }
            | AdapterError::UnableToReadFile { cause, .. }
            | AdapterError::UnableToCopyFile { cause, .. }
            | AdapterError::UnableToMoveFile { cause, .. }
            | AdapterError::UnableToDeleteFile { cause, .. }
            | AdapterError::UnableToCreateDirectory { cause, .. }
            | AdapterError::UnableToDeleteDirectory { cause, .. }
            | AdapterError::UnableToRetrieveMetadata { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub(crate) fn unable_to_write(path: &str, cause: impl Into<AdapterError>) -> Self {
        AdapterError::UnableToWriteFile {
            path: path.to_string(),
            cause: Box::new(cause.into()),
        }
    }

    pub(crate) fn unable_to_read(path: &str, cause: impl Into<AdapterError>) -> Self {
        AdapterError::UnableToReadFile {
            path: path.to_string(),
            cause: Box::new(cause.into()),
        }
    }

    pub(crate) fn unable_to_copy(from: &str, to: &str, cause: impl Into<AdapterError>) -> Self {
        AdapterError::UnableToCopyFile {
            from: from.to_string(),
            to: to.to_string(),
            cause: Box::new(cause.into()),
        }
    }

    pub(crate) fn unable_to_move(from: &str, to: &str, cause: impl Into<AdapterError>) -> Self {
        AdapterError::UnableToMoveFile {
            from: from.to_string(),
            to: to.to_string(),
            cause: Box::new(cause.into()),
        }
    }

    pub(crate) fn unable_to_delete(path: &str, cause: impl Into<AdapterError>) -> Self {
        AdapterError::UnableToDeleteFile {
            path: path.to_string(),
            cause: Box::new(cause.into()),
        }
    }

    pub(crate) fn unable_to_create_directory(path: &str, cause: impl Into<AdapterError>) -> Self {
        AdapterError::UnableToCreateDirectory {
            path: path.to_string(),
            cause: Box::new(cause.into()),
        }
    }

    pub(crate) fn unable_to_delete_directory(path: &str, cause: impl Into<AdapterError>) -> Self {
        AdapterError::UnableToDeleteDirectory {
            path: path.to_string(),
            cause: Box::new(cause.into()),
        }
    }

    pub(crate) fn unable_to_retrieve(
        path: &str,
        attribute: MetadataAttribute,
        cause: impl Into<AdapterError>,
    ) -> Self {
        AdapterError::UnableToRetrieveMetadata {
            path: path.to_string(),
            attribute,
            cause: Box::new(cause.into()),
        }
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;
