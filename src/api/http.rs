//! HTTP client for the Cloudinary Admin, Upload and delivery APIs.
//!
//! Admin calls authenticate with HTTP Basic auth. Upload calls carry a
//! signature over their parameters (see [`super::signature`]).

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use super::signature::sign_params;
use super::{
    AssetApi, ContentStream, ListAssetsRequest, ListAssetsResponse, UploadOptions, UploadSource,
};
use crate::config::CloudConfig;
use crate::error::{ApiError, ApiResult};
use crate::metadata::AssetRecord;

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Error envelope used by every Cloudinary API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary API client
pub struct CloudinaryClient {
    client: reqwest::Client,
    config: CloudConfig,
}

impl CloudinaryClient {
    /// Create a new client for the configured account
    pub fn new(config: CloudConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// `{api_base}/v1_1/{cloud}/{path}`
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/v1_1/{}/{}",
            self.config.api_base_url, self.config.cloud_name, path
        )
    }

    fn admin_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.api_url(path))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
    }

    /// Add `timestamp`, `api_key` and `signature` to upload parameters
    fn signed_params(&self, mut params: BTreeMap<String, String>) -> BTreeMap<String, String> {
        params.insert(
            "timestamp".to_string(),
            chrono::Utc::now().timestamp().to_string(),
        );
        let signature = sign_params(&params, &self.config.api_secret);
        params.insert("api_key".to_string(), self.config.api_key.clone());
        params.insert("signature".to_string(), signature);
        params
    }

    /// Pass a successful response through, or turn a failed one into an [`ApiError`]
    async fn check(response: Response, subject: &str) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, subject, &body))
    }

    async fn send_delivery(&self, public_id: &str) -> ApiResult<Response> {
        let url = self.delivery_url(public_id);
        trace!("download: {}", url);
        let response = self.client.get(&url).send().await?;
        Self::check(response, public_id).await
    }
}

/// Map a non-success status and its body onto an [`ApiError`].
///
/// 404 means the subject does not exist. Anything else keeps the service's
/// `error.message` when the body carries one, and the raw body otherwise.
fn status_error(status: StatusCode, subject: &str, body: &str) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound(subject.to_string());
    }

    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Percent-encode each segment of a public ID, keeping the separators
fn encode_public_id(public_id: &str) -> String {
    public_id
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Query pairs for a listing request
fn list_query(request: &ListAssetsRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("type", request.delivery_type.clone()),
        ("prefix", request.prefix.clone()),
        ("max_results", request.max_results.to_string()),
    ];
    if let Some(cursor) = &request.next_cursor {
        query.push(("next_cursor", cursor.clone()));
    }
    query
}

#[async_trait]
impl AssetApi for CloudinaryClient {
    async fn upload(
        &self,
        source: UploadSource,
        options: &UploadOptions,
    ) -> ApiResult<AssetRecord> {
        debug!(
            "upload: public_id={} resource_type={}",
            options.public_id, options.resource_type
        );

        let mut params = BTreeMap::new();
        params.insert("public_id".to_string(), options.public_id.clone());
        let params = self.signed_params(params);

        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(key, value);
        }
        form = match source {
            UploadSource::Bytes(content) => {
                let file_name = options
                    .public_id
                    .rsplit('/')
                    .next()
                    .unwrap_or(&options.public_id)
                    .to_string();
                form.part("file", Part::bytes(content.to_vec()).file_name(file_name))
            }
            UploadSource::Url(url) => form.text("file", url),
        };

        let response = self
            .client
            .post(self.api_url(&format!("{}/upload", options.resource_type)))
            .multipart(form)
            .send()
            .await?;
        let response = Self::check(response, &options.public_id).await?;
        Ok(response.json().await?)
    }

    async fn destroy(&self, public_id: &str, invalidate: bool) -> ApiResult<String> {
        debug!("destroy: public_id={} invalidate={}", public_id, invalidate);

        let mut params = BTreeMap::new();
        params.insert("public_id".to_string(), public_id.to_string());
        params.insert("invalidate".to_string(), invalidate.to_string());
        let params = self.signed_params(params);

        let response = self
            .client
            .post(self.api_url(&format!("{}/destroy", self.config.resource_type)))
            .form(&params)
            .send()
            .await?;
        let response = Self::check(response, public_id).await?;
        let body: DestroyResponse = response.json().await?;
        Ok(body.result)
    }

    async fn asset(&self, public_id: &str) -> ApiResult<AssetRecord> {
        trace!("asset: public_id={}", public_id);

        let path = format!(
            "resources/{}/upload/{}",
            self.config.resource_type,
            encode_public_id(public_id)
        );
        let response = self.admin_request(Method::GET, &path).send().await?;
        let response = Self::check(response, public_id).await?;
        Ok(response.json().await?)
    }

    async fn list_assets(&self, request: &ListAssetsRequest) -> ApiResult<ListAssetsResponse> {
        trace!(
            "list_assets: prefix={} cursor={:?}",
            request.prefix,
            request.next_cursor
        );

        let path = format!(
            "resources/{}/{}",
            self.config.resource_type, request.delivery_type
        );
        let response = self
            .admin_request(Method::GET, &path)
            .query(&list_query(request))
            .send()
            .await?;
        let response = Self::check(response, &request.prefix).await?;
        Ok(response.json().await?)
    }

    async fn create_folder(&self, path: &str) -> ApiResult<()> {
        debug!("create_folder: {}", path);

        let url_path = format!("folders/{}", encode_public_id(path.trim_matches('/')));
        let response = self.admin_request(Method::POST, &url_path).send().await?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> ApiResult<()> {
        debug!("delete_folder: {}", path);

        let url_path = format!("folders/{}", encode_public_id(path.trim_matches('/')));
        let response = self.admin_request(Method::DELETE, &url_path).send().await?;
        Self::check(response, path).await?;
        Ok(())
    }

    fn delivery_url(&self, public_id: &str) -> String {
        format!(
            "{}/{}/{}/upload/{}",
            self.config.delivery_base_url,
            self.config.cloud_name,
            self.config.resource_type,
            encode_public_id(public_id)
        )
    }

    async fn download(&self, public_id: &str) -> ApiResult<Bytes> {
        let response = self.send_delivery(public_id).await?;
        Ok(response.bytes().await?)
    }

    async fn download_stream(&self, public_id: &str) -> ApiResult<ContentStream> {
        let response = self.send_delivery(public_id).await?;
        Ok(Box::pin(response.bytes_stream().map_err(ApiError::from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CloudinaryClient {
        CloudinaryClient::new(CloudConfig::new("demo", "key", "secret")).unwrap()
    }

    #[test]
    fn test_api_url() {
        assert_eq!(
            client().api_url("resources/image/upload"),
            "https://api.cloudinary.com/v1_1/demo/resources/image/upload"
        );
    }

    #[test]
    fn test_delivery_url_encodes_segments() {
        assert_eq!(
            client().delivery_url("photos/summer trip/a"),
            "https://res.cloudinary.com/demo/image/upload/photos/summer%20trip/a"
        );
    }

    #[test]
    fn test_list_query_includes_cursor_only_when_present() {
        let first = ListAssetsRequest::first_page("photos/");
        let query = list_query(&first);
        assert_eq!(
            query,
            vec![
                ("type", "upload".to_string()),
                ("prefix", "photos/".to_string()),
                ("max_results", "500".to_string()),
            ]
        );

        // An empty cursor is still sent
        let next = first.with_cursor("");
        assert_eq!(list_query(&next).last(), Some(&("next_cursor", String::new())));
    }

    #[test]
    fn test_not_found_status() {
        let err = status_error(StatusCode::NOT_FOUND, "photos/a", "");
        assert_eq!(err, ApiError::NotFound("photos/a".to_string()));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_error_envelope_message_is_used() {
        let body = r#"{"error":{"message":"Invalid credentials"}}"#;
        let err = status_error(StatusCode::UNAUTHORIZED, "photos/a", body);
        assert_eq!(
            err,
            ApiError::Status {
                status: 401,
                message: "Invalid credentials".to_string(),
            }
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_non_json_error_body_is_kept() {
        let err = status_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "photos/a",
            "upstream exploded",
        );
        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                message: "upstream exploded".to_string(),
            }
        );
    }

    #[test]
    fn test_signed_params_carry_key_and_signature() {
        let client = client();
        let mut params = BTreeMap::new();
        params.insert("public_id".to_string(), "a".to_string());
        let signed = client.signed_params(params);

        assert_eq!(signed.get("api_key").map(String::as_str), Some("key"));
        assert!(signed.contains_key("timestamp"));

        let mut unsigned = signed.clone();
        let signature = unsigned.remove("signature").unwrap();
        assert_eq!(signature, sign_params(&unsigned, "secret"));
    }
}
