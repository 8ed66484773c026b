//! In-memory asset service
//!
//! Keeps assets in a `BTreeMap` keyed by public ID and answers every
//! [`AssetApi`] call locally. Listing pages can be scripted, failures injected
//! per operation, and listing requests are recorded so tests can assert on
//! what was fetched.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::trace;

use super::{
    AssetApi, ListAssetsRequest, ListAssetsResponse, UploadOptions, UploadSource, DESTROY_OK,
};
use crate::error::{ApiError, ApiResult};
use crate::metadata::AssetRecord;

/// Scheme used for delivery URLs handed out by [`MemoryAssetApi`]
const MEMORY_SCHEME: &str = "memory://";

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    Destroy,
    Asset,
    ListAssets,
    CreateFolder,
    DeleteFolder,
    Download,
}

#[derive(Debug, Clone)]
struct StoredAsset {
    record: AssetRecord,
    content: Bytes,
}

/// In-memory [`AssetApi`] implementation
#[derive(Default)]
pub struct MemoryAssetApi {
    assets: RwLock<BTreeMap<String, StoredAsset>>,
    folders: RwLock<BTreeSet<String>>,
    /// Pages returned by `list_assets` before falling back to the store
    scripted_pages: Mutex<VecDeque<ApiResult<ListAssetsResponse>>>,
    failures: RwLock<HashMap<Operation, ApiError>>,
    list_requests: Mutex<Vec<ListAssetsRequest>>,
}

impl MemoryAssetApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an asset with a record derived from its public ID
    pub fn insert(&self, public_id: &str, content: impl Into<Bytes>) {
        let content = content.into();
        let record = build_record(public_id, "auto", content.len());
        self.insert_record(record, content);
    }

    /// Store an asset with an explicit record. The record must carry a string `public_id`.
    pub fn insert_record(&self, record: AssetRecord, content: impl Into<Bytes>) {
        let public_id = record
            .str_field("public_id")
            .unwrap_or_default()
            .to_string();
        self.assets.write().insert(
            public_id,
            StoredAsset {
                record,
                content: content.into(),
            },
        );
    }

    /// Queue a response for the next `list_assets` call
    pub fn push_page(&self, page: ApiResult<ListAssetsResponse>) {
        self.scripted_pages.lock().push_back(page);
    }

    /// Make every call of `operation` fail with `error`
    pub fn fail(&self, operation: Operation, error: ApiError) {
        self.failures.write().insert(operation, error);
    }

    pub fn clear_failure(&self, operation: Operation) {
        self.failures.write().remove(&operation);
    }

    /// Listing requests received so far
    pub fn list_requests(&self) -> Vec<ListAssetsRequest> {
        self.list_requests.lock().clone()
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.assets.read().contains_key(public_id)
    }

    pub fn content(&self, public_id: &str) -> Option<Bytes> {
        self.assets.read().get(public_id).map(|a| a.content.clone())
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.folders.read().contains(path.trim_matches('/'))
    }

    fn check_failure(&self, operation: Operation) -> ApiResult<()> {
        match self.failures.read().get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Page through stored assets; the cursor is the index of the next asset
    fn page_from_store(&self, request: &ListAssetsRequest) -> ApiResult<ListAssetsResponse> {
        let start = match request.next_cursor.as_deref() {
            None | Some("") => 0,
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| ApiError::Status {
                    status: 400,
                    message: format!("Invalid next_cursor {:?}", cursor),
                })?,
        };

        let assets = self.assets.read();
        let matching: Vec<&StoredAsset> = assets
            .iter()
            .filter(|(id, _)| id.starts_with(&request.prefix))
            .map(|(_, asset)| asset)
            .collect();

        let page_size = request.max_results.max(1) as usize;
        let end = (start + page_size).min(matching.len());
        let resources = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|asset| asset.record.clone())
            .collect();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(ListAssetsResponse {
            resources,
            next_cursor,
        })
    }
}

/// Resource type and format for a public ID, the way `auto` uploads classify them
fn classify(public_id: &str) -> (&'static str, String) {
    let format = public_id
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let resource_type = match format.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "tiff" => "image",
        "mp4" | "mov" | "webm" | "avi" | "mkv" => "video",
        _ => "raw",
    };
    (resource_type, format)
}

fn build_record(public_id: &str, resource_type: &str, size: usize) -> AssetRecord {
    let (detected_type, format) = classify(public_id);
    let resource_type = if resource_type == "auto" {
        detected_type
    } else {
        resource_type
    };
    let now = Utc::now();
    let version = now.timestamp();
    let url = format!(
        "{}{}/upload/v{}/{}",
        MEMORY_SCHEME, resource_type, version, public_id
    );

    let value = json!({
        "public_id": public_id,
        "version": version,
        "resource_type": resource_type,
        "type": "upload",
        "format": format,
        "bytes": size,
        "created_at": now.to_rfc3339_opts(SecondsFormat::Secs, true),
        "url": url,
        "secure_url": url,
    });
    match value {
        Value::Object(map) => AssetRecord::new(map),
        _ => AssetRecord::default(),
    }
}

#[async_trait]
impl AssetApi for MemoryAssetApi {
    async fn upload(
        &self,
        source: UploadSource,
        options: &UploadOptions,
    ) -> ApiResult<AssetRecord> {
        self.check_failure(Operation::Upload)?;
        trace!("memory upload: {}", options.public_id);

        let content = match source {
            UploadSource::Bytes(content) => content,
            UploadSource::Url(url) => {
                let source_id = url.strip_prefix(MEMORY_SCHEME).ok_or_else(|| {
                    ApiError::Status {
                        status: 400,
                        message: format!("Unsupported source URL {}", url),
                    }
                })?;
                self.content(source_id)
                    .ok_or_else(|| ApiError::NotFound(source_id.to_string()))?
            }
        };

        let record = build_record(&options.public_id, &options.resource_type, content.len());
        self.insert_record(record.clone(), content);
        Ok(record)
    }

    async fn destroy(&self, public_id: &str, _invalidate: bool) -> ApiResult<String> {
        self.check_failure(Operation::Destroy)?;
        match self.assets.write().remove(public_id) {
            Some(_) => Ok(DESTROY_OK.to_string()),
            None => Ok("not found".to_string()),
        }
    }

    async fn asset(&self, public_id: &str) -> ApiResult<AssetRecord> {
        self.check_failure(Operation::Asset)?;
        self.assets
            .read()
            .get(public_id)
            .map(|asset| asset.record.clone())
            .ok_or_else(|| ApiError::NotFound(public_id.to_string()))
    }

    async fn list_assets(&self, request: &ListAssetsRequest) -> ApiResult<ListAssetsResponse> {
        self.list_requests.lock().push(request.clone());
        self.check_failure(Operation::ListAssets)?;

        let scripted = self.scripted_pages.lock().pop_front();
        match scripted {
            Some(page) => page,
            None => self.page_from_store(request),
        }
    }

    async fn create_folder(&self, path: &str) -> ApiResult<()> {
        self.check_failure(Operation::CreateFolder)?;
        self.folders.write().insert(path.trim_matches('/').to_string());
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> ApiResult<()> {
        self.check_failure(Operation::DeleteFolder)?;
        let path = path.trim_matches('/');
        if self.folders.write().remove(path) {
            Ok(())
        } else {
            Err(ApiError::NotFound(path.to_string()))
        }
    }

    fn delivery_url(&self, public_id: &str) -> String {
        format!("{}{}", MEMORY_SCHEME, public_id)
    }

    async fn download(&self, public_id: &str) -> ApiResult<Bytes> {
        self.check_failure(Operation::Download)?;
        self.content(public_id)
            .ok_or_else(|| ApiError::NotFound(public_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("photos/a.JPG"), ("image", "jpg".to_string()));
        assert_eq!(classify("clips/b.mp4"), ("video", "mp4".to_string()));
        assert_eq!(classify("docs/readme"), ("raw", String::new()));
        assert_eq!(classify("dir.v2/readme"), ("raw", String::new()));
    }

    #[tokio::test]
    async fn test_store_pagination() {
        let api = MemoryAssetApi::new();
        for i in 0..5 {
            api.insert(&format!("p/{}.png", i), vec![0u8; i]);
        }
        api.insert("other/x.png", "x");

        let mut request = ListAssetsRequest::first_page("p/");
        request.max_results = 2;

        let first = api.list_assets(&request).await.unwrap();
        assert_eq!(first.resources.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let last = api
            .list_assets(&request.clone().with_cursor("4"))
            .await
            .unwrap();
        assert_eq!(last.resources.len(), 1);
        assert_eq!(last.next_cursor, None);
        assert_eq!(api.list_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_pages_take_precedence() {
        let api = MemoryAssetApi::new();
        api.insert("p/a.png", "a");
        api.push_page(Err(ApiError::Transport("boom".into())));

        let request = ListAssetsRequest::first_page("p/");
        assert!(api.list_assets(&request).await.is_err());
        assert_eq!(api.list_assets(&request).await.unwrap().resources.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_from_delivery_url_copies_content() {
        let api = MemoryAssetApi::new();
        api.insert("a.png", "pixels");

        let options = UploadOptions {
            public_id: "b.png".to_string(),
            resource_type: "auto".to_string(),
        };
        api.upload(UploadSource::Url(api.delivery_url("a.png")), &options)
            .await
            .unwrap();

        assert_eq!(api.content("b.png"), Some(Bytes::from("pixels")));
        let record = api.asset("b.png").await.unwrap();
        assert_eq!(record.str_field("resource_type"), Some("image"));
    }

    #[tokio::test]
    async fn test_destroy_reports_not_found() {
        let api = MemoryAssetApi::new();
        assert_eq!(api.destroy("nope", true).await.unwrap(), "not found");
    }
}
