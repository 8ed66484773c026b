pub mod cloudinary;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, TryStreamExt};

use crate::error::{AdapterError, Result};
use crate::listing::FileAttributesStream;
use crate::metadata::{FileAttributes, Visibility};

pub use cloudinary::CloudinaryAdapter;

/// Resource type used for uploads when none is given
pub const DEFAULT_UPLOAD_RESOURCE_TYPE: &str = "auto";

/// Stream of file content chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Per-call write options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Public ID to store under. Defaults to the path.
    pub public_id: Option<String>,
    /// Upload resource type (`image`, `video`, `raw`, `auto`). Defaults to `auto`.
    pub resource_type: Option<String>,
}

impl WriteOptions {
    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.public_id = Some(public_id.into());
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn public_id_or<'a>(&'a self, path: &'a str) -> &'a str {
        self.public_id.as_deref().unwrap_or(path)
    }

    pub fn resource_type_or_default(&self) -> &str {
        self.resource_type
            .as_deref()
            .unwrap_or(DEFAULT_UPLOAD_RESOURCE_TYPE)
    }
}

/// Path-based filesystem operations over a storage backend
///
/// Paths are backend identifiers (public IDs), not local paths. Every
/// operation performs its remote calls directly; nothing is cached.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    /// Check whether a file exists
    async fn file_exists(&self, path: &str) -> Result<bool>;

    /// Check whether a directory exists
    async fn directory_exists(&self, path: &str) -> Result<bool>;

    /// Write a file, replacing any existing one
    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<()>;

    /// Write a file from a stream of chunks
    ///
    /// Default implementation buffers the stream and calls write()
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        options: &WriteOptions,
    ) -> Result<()> {
        let buffer = contents
            .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok(buffer)
            })
            .await
            .map_err(|e| AdapterError::unable_to_write(path, e))?;
        self.write(path, buffer.freeze(), options).await
    }

    /// Read a whole file
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Read a file as a stream of chunks
    async fn read_stream(&self, path: &str) -> Result<ByteStream>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn delete_directory(&self, path: &str) -> Result<()>;

    async fn create_directory(&self, path: &str) -> Result<()>;

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()>;

    async fn visibility(&self, path: &str) -> Result<FileAttributes>;

    async fn mime_type(&self, path: &str) -> Result<FileAttributes>;

    async fn last_modified(&self, path: &str) -> Result<FileAttributes>;

    async fn file_size(&self, path: &str) -> Result<FileAttributes>;

    /// List entries under a directory as a stream
    ///
    /// # Arguments
    /// * `path` - Directory (prefix) to list
    /// * `recursive` - Whether nested entries are wanted; backends with flat
    ///   prefix matching may ignore it
    fn list_contents(&self, path: &str, recursive: bool) -> FileAttributesStream;

    async fn move_file(&self, from: &str, to: &str, options: &WriteOptions) -> Result<()>;

    async fn copy(&self, from: &str, to: &str, options: &WriteOptions) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_option_defaults() {
        let options = WriteOptions::default();
        assert_eq!(options.public_id_or("a/b.png"), "a/b.png");
        assert_eq!(options.resource_type_or_default(), "auto");

        let options = options.with_public_id("custom").with_resource_type("raw");
        assert_eq!(options.public_id_or("a/b.png"), "custom");
        assert_eq!(options.resource_type_or_default(), "raw");
    }
}
