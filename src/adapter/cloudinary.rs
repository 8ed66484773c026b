//! Cloudinary filesystem adapter
//!
//! Maps filesystem operations onto the Cloudinary Upload and Admin APIs.
//! Cloudinary has no access control, so every asset reports public
//! visibility and `set_visibility` does nothing. It also has no notion of
//! an existing-but-empty directory that can be queried, so
//! `directory_exists` is unsupported.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use tracing::{debug, trace};

use crate::adapter::{ByteStream, FilesystemAdapter, WriteOptions};
use crate::api::http::CloudinaryClient;
use crate::api::{AssetApi, UploadOptions, UploadSource, DESTROY_OK};
use crate::config::CloudConfig;
use crate::error::{AdapterError, MetadataAttribute, Result};
use crate::listing::{list_assets, FileAttributesStream};
use crate::metadata::{normalize, FileAttributes, Visibility};

/// Filesystem adapter backed by a Cloudinary account
#[derive(Clone)]
pub struct CloudinaryAdapter {
    api: Arc<dyn AssetApi>,
}

impl CloudinaryAdapter {
    /// Create an adapter over an existing API handle
    pub fn new(api: Arc<dyn AssetApi>) -> Self {
        Self { api }
    }

    /// Create an adapter talking HTTP to the configured account
    pub fn from_config(config: CloudConfig) -> Result<Self> {
        let client = CloudinaryClient::new(config)?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Full normalized attributes of a single asset
    pub async fn metadata(&self, path: &str) -> Result<FileAttributes> {
        self.fetch_file_metadata(path, MetadataAttribute::All).await
    }

    async fn fetch_file_metadata(
        &self,
        path: &str,
        attribute: MetadataAttribute,
    ) -> Result<FileAttributes> {
        trace!("fetch_file_metadata: path={} attribute={}", path, attribute);

        let record = self
            .api
            .asset(path)
            .await
            .map_err(|e| AdapterError::unable_to_retrieve(path, attribute, e))?;

        normalize(&record).map_err(|e| AdapterError::unable_to_retrieve(path, attribute, e))
    }
}

#[async_trait]
impl FilesystemAdapter for CloudinaryAdapter {
    async fn file_exists(&self, path: &str) -> Result<bool> {
        trace!("file_exists: {}", path);

        match self.api.asset(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn directory_exists(&self, path: &str) -> Result<bool> {
        Err(AdapterError::UnsupportedOperation(format!(
            "Cloudinary cannot check whether directory {:?} exists",
            path
        )))
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<()> {
        let upload = UploadOptions {
            public_id: options.public_id_or(path).to_string(),
            resource_type: options.resource_type_or_default().to_string(),
        };
        debug!(
            "write: path={} public_id={} size={}",
            path,
            upload.public_id,
            contents.len()
        );

        self.api
            .upload(UploadSource::Bytes(contents), &upload)
            .await
            .map_err(|e| AdapterError::unable_to_write(path, e))?;

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        trace!("read: {}", path);

        self.api
            .download(path)
            .await
            .map_err(|e| AdapterError::unable_to_read(path, e))
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        trace!("read_stream: {}", path);

        let stream = self
            .api
            .download_stream(path)
            .await
            .map_err(|e| AdapterError::unable_to_read(path, e))?;

        Ok(Box::pin(stream.map_err(AdapterError::from)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        debug!("delete: {}", path);

        let result = self
            .api
            .destroy(path, true)
            .await
            .map_err(|e| AdapterError::unable_to_delete(path, e))?;

        if result != DESTROY_OK {
            return Err(AdapterError::unable_to_delete(
                path,
                AdapterError::NotFound(format!("destroy returned {:?}", result)),
            ));
        }

        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> Result<()> {
        debug!("delete_directory: {}", path);

        self.api
            .delete_folder(path)
            .await
            .map_err(|e| AdapterError::unable_to_delete_directory(path, e))
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        debug!("create_directory: {}", path);

        self.api
            .create_folder(path)
            .await
            .map_err(|e| AdapterError::unable_to_create_directory(path, e))
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        // Everything is public
        trace!("set_visibility ignored: path={} visibility={}", path, visibility);
        Ok(())
    }

    async fn visibility(&self, path: &str) -> Result<FileAttributes> {
        self.fetch_file_metadata(path, MetadataAttribute::Visibility)
            .await
    }

    async fn mime_type(&self, path: &str) -> Result<FileAttributes> {
        self.fetch_file_metadata(path, MetadataAttribute::MimeType)
            .await
    }

    async fn last_modified(&self, path: &str) -> Result<FileAttributes> {
        self.fetch_file_metadata(path, MetadataAttribute::LastModified)
            .await
    }

    async fn file_size(&self, path: &str) -> Result<FileAttributes> {
        self.fetch_file_metadata(path, MetadataAttribute::FileSize)
            .await
    }

    /// Prefix listing is flat: `recursive` is accepted and ignored, and
    /// nested assets under `path` are always included.
    fn list_contents(&self, path: &str, recursive: bool) -> FileAttributesStream {
        trace!("list_contents: path={} recursive={}", path, recursive);
        list_assets(self.api.clone(), path)
    }

    async fn move_file(&self, from: &str, to: &str, options: &WriteOptions) -> Result<()> {
        debug!("move_file: {} -> {}", from, to);

        self.copy(from, to, options)
            .await
            .map_err(|e| AdapterError::unable_to_move(from, to, e))?;
        self.delete(from)
            .await
            .map_err(|e| AdapterError::unable_to_move(from, to, e))
    }

    async fn copy(&self, from: &str, to: &str, options: &WriteOptions) -> Result<()> {
        debug!("copy: {} -> {}", from, to);

        // The service fetches the source itself from its delivery URL
        let source = UploadSource::Url(self.api.delivery_url(from));
        let upload = UploadOptions {
            public_id: to.to_string(),
            resource_type: options.resource_type_or_default().to_string(),
        };

        self.api
            .upload(source, &upload)
            .await
            .map_err(|e| AdapterError::unable_to_copy(from, to, e))?;

        Ok(())
    }
}
