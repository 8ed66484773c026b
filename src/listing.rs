//! Paginated asset listing
//!
//! [`list_assets`] walks the "list assets under prefix" endpoint one page at a
//! time and yields each asset as [`FileAttributes`]. Nothing is fetched until
//! the stream is polled, and a page is only requested once the previous page
//! has been fully consumed.
//!
//! The stream moves through these states:
//!
//! - idle until the first poll
//! - fetching a page
//! - emitting that page's records, then fetching again while the response
//!   carried a `next_cursor`
//! - exhausted once a page without `next_cursor` has been emitted
//! - failed after a fetch or normalization error
//!
//! Exhausted and failed are terminal: the stream ends and issues no further
//! requests. Dropping the stream cancels the listing.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use tracing::{debug, trace};

use crate::api::{AssetApi, ListAssetsRequest};
use crate::error::{AdapterError, Result};
use crate::metadata::{normalize, FileAttributes};

/// Stream type for asset listings
pub type FileAttributesStream = Pin<Box<dyn Stream<Item = Result<FileAttributes>> + Send>>;

/// List every uploaded asset whose public ID starts with `prefix`.
///
/// Pagination continues while a response carries a `next_cursor` key, even
/// an empty one; it stops at the first response without the key. A failed
/// page fetch yields [`AdapterError::Listing`] and ends the stream; items
/// already yielded stay delivered.
pub fn list_assets(api: Arc<dyn AssetApi>, prefix: impl Into<String>) -> FileAttributesStream {
    let prefix = prefix.into();

    Box::pin(try_stream! {
        let mut request = ListAssetsRequest::first_page(prefix.clone());
        let mut page_number = 0usize;

        loop {
            page_number += 1;
            debug!(
                "list_assets: prefix={} page={} cursor={:?}",
                prefix, page_number, request.next_cursor
            );

            let page = api.list_assets(&request).await.map_err(|source| {
                AdapterError::Listing {
                    prefix: prefix.clone(),
                    source,
                }
            })?;
            trace!(
                "list_assets: prefix={} page={} resources={}",
                prefix,
                page_number,
                page.resources.len()
            );

            for record in &page.resources {
                yield normalize(record)?;
            }

            match page.next_cursor {
                Some(cursor) => request.next_cursor = Some(cursor),
                None => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::{MemoryAssetApi, Operation};
    use crate::api::ListAssetsResponse;
    use crate::error::ApiError;
    use crate::metadata::AssetRecord;
    use futures::StreamExt;
    use serde_json::json;

    fn record(public_id: &str, bytes: u64) -> AssetRecord {
        serde_json::from_value(json!({
            "public_id": public_id,
            "bytes": bytes,
            "created_at": "2024-01-01T00:00:00Z",
            "resource_type": "image",
            "format": "jpg",
        }))
        .unwrap()
    }

    fn page(records: Vec<AssetRecord>, cursor: Option<&str>) -> ListAssetsResponse {
        ListAssetsResponse {
            resources: records,
            next_cursor: cursor.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_nothing_fetched_before_first_poll() {
        let api = Arc::new(MemoryAssetApi::new());
        let stream = list_assets(api.clone(), "photos/");
        assert!(api.list_requests().is_empty());
        drop(stream);
        assert!(api.list_requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let api = Arc::new(MemoryAssetApi::new());
        api.push_page(Ok(page(vec![], None)));

        let items: Vec<_> = list_assets(api.clone(), "nothing/").collect().await;
        assert!(items.is_empty());
        assert_eq!(api.list_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_cursor_keeps_paginating() {
        let api = Arc::new(MemoryAssetApi::new());
        api.push_page(Ok(page(vec![record("a", 1)], Some(""))));
        api.push_page(Ok(page(vec![record("b", 2)], None)));

        let paths: Vec<String> = list_assets(api.clone(), "")
            .map(|item| item.unwrap().path)
            .collect()
            .await;
        assert_eq!(paths, vec!["a", "b"]);

        let requests = api.list_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].next_cursor.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_next_page_fetched_only_after_current_is_consumed() {
        let api = Arc::new(MemoryAssetApi::new());
        api.push_page(Ok(page(vec![record("a", 1), record("b", 2)], Some("c1"))));
        api.push_page(Ok(page(vec![record("c", 3)], None)));

        let mut stream = list_assets(api.clone(), "");
        assert_eq!(stream.next().await.unwrap().unwrap().path, "a");
        assert_eq!(stream.next().await.unwrap().unwrap().path, "b");
        assert_eq!(api.list_requests().len(), 1);

        assert_eq!(stream.next().await.unwrap().unwrap().path, "c");
        assert_eq!(api.list_requests().len(), 2);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_dropping_stream_stops_pagination() {
        let api = Arc::new(MemoryAssetApi::new());
        api.push_page(Ok(page(vec![record("a", 1)], Some("more"))));
        api.push_page(Ok(page(vec![record("b", 2)], None)));

        let mut stream = list_assets(api.clone(), "");
        let first = tokio_test::block_on(stream.next()).unwrap();
        tokio_test::assert_ok!(first);
        drop(stream);

        assert_eq!(api.list_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_record_ends_listing() {
        let api = Arc::new(MemoryAssetApi::new());
        let broken: AssetRecord = serde_json::from_value(json!({ "bytes": 1 })).unwrap();
        api.push_page(Ok(page(vec![record("a", 1), broken, record("c", 3)], Some("x"))));

        let mut stream = list_assets(api.clone(), "");
        assert!(stream.next().await.unwrap().is_ok());
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(AdapterError::Metadata(_))
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(api.list_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_first_page_failure() {
        let api = Arc::new(MemoryAssetApi::new());
        api.fail(Operation::ListAssets, ApiError::Transport("refused".into()));

        let items: Vec<_> = list_assets(api.clone(), "photos/").collect().await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(AdapterError::Listing { prefix, source }) => {
                assert_eq!(prefix, "photos/");
                assert_eq!(source, &ApiError::Transport("refused".into()));
            }
            other => panic!("Expected listing error, got {:?}", other),
        }
    }
}
