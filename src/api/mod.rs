//! Remote asset service interface
//!
//! [`AssetApi`] is the seam between the filesystem adapter and Cloudinary.
//! [`http::CloudinaryClient`] talks to the real Upload and Admin APIs;
//! [`memory::MemoryAssetApi`] keeps assets in process for tests and dry runs.

pub mod http;
pub mod memory;
pub mod signature;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::metadata::AssetRecord;

/// Delivery type used for every listing
pub const UPLOAD_DELIVERY_TYPE: &str = "upload";

/// Page size requested from the listing endpoint
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Stream of downloaded content chunks
pub type ContentStream = Pin<Box<dyn Stream<Item = ApiResult<Bytes>> + Send>>;

/// One "list assets" call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAssetsRequest {
    pub delivery_type: String,
    pub prefix: String,
    pub max_results: u32,
    pub next_cursor: Option<String>,
}

impl ListAssetsRequest {
    /// Request for the first page of assets under `prefix`
    pub fn first_page(prefix: impl Into<String>) -> Self {
        Self {
            delivery_type: UPLOAD_DELIVERY_TYPE.to_string(),
            prefix: prefix.into(),
            max_results: DEFAULT_PAGE_SIZE,
            next_cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }
}

/// One page of listing results.
///
/// `next_cursor` is `None` only when the key is absent (or null); an empty
/// string is still a cursor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListAssetsResponse {
    #[serde(default)]
    pub resources: Vec<AssetRecord>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// What to upload
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Raw file content
    Bytes(Bytes),
    /// A remote URL the service fetches itself
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub public_id: String,
    pub resource_type: String,
}

/// Outcome string reported by a successful destroy call
pub const DESTROY_OK: &str = "ok";

/// Remote asset service operations
#[async_trait]
pub trait AssetApi: Send + Sync {
    /// Upload content under a public ID, replacing any existing asset
    async fn upload(&self, source: UploadSource, options: &UploadOptions)
        -> ApiResult<AssetRecord>;

    /// Destroy an asset. Returns the service's `result` string, `"ok"` on success.
    async fn destroy(&self, public_id: &str, invalidate: bool) -> ApiResult<String>;

    /// Fetch the details of a single asset
    async fn asset(&self, public_id: &str) -> ApiResult<AssetRecord>;

    /// Fetch one page of assets
    async fn list_assets(&self, request: &ListAssetsRequest) -> ApiResult<ListAssetsResponse>;

    async fn create_folder(&self, path: &str) -> ApiResult<()>;

    async fn delete_folder(&self, path: &str) -> ApiResult<()>;

    /// Public delivery URL for an asset
    fn delivery_url(&self, public_id: &str) -> String;

    /// Download the full content of an asset
    async fn download(&self, public_id: &str) -> ApiResult<Bytes>;

    /// Download an asset as a stream of chunks
    ///
    /// Default implementation downloads everything and yields one chunk
    async fn download_stream(&self, public_id: &str) -> ApiResult<ContentStream> {
        let content = self.download(public_id).await?;
        Ok(Box::pin(stream::once(async move {
            Ok::<_, ApiError>(content)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> ListAssetsResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_next_cursor_shapes() {
        let empty = decode(json!({ "resources": [], "next_cursor": "" }));
        assert_eq!(empty.next_cursor.as_deref(), Some(""));

        let null = decode(json!({ "resources": [], "next_cursor": null }));
        assert_eq!(null.next_cursor, None);

        let absent = decode(json!({ "resources": [] }));
        assert_eq!(absent.next_cursor, None);

        let token = decode(json!({ "next_cursor": "abc" }));
        assert_eq!(token.next_cursor.as_deref(), Some("abc"));
        assert!(token.resources.is_empty());
    }

    #[test]
    fn test_first_page_and_cursor() {
        let request = ListAssetsRequest::first_page("photos/");
        assert_eq!(request.delivery_type, UPLOAD_DELIVERY_TYPE);
        assert_eq!(request.max_results, DEFAULT_PAGE_SIZE);
        assert_eq!(request.next_cursor, None);

        let next = request.with_cursor("");
        assert_eq!(next.next_cursor.as_deref(), Some(""));
        assert_eq!(next.prefix, "photos/");
    }
}
