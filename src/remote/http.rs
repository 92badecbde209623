use super::{
    ChunkedInit, ChunkedSession, MediaMetadata, MultipartUpload, PresignedUpload, ProjectPayload,
    RemoteApi,
};
use crate::config::RemoteConfig;
use crate::error::{AppError, AppResult};
use crate::models::{RemoteMedia, RemoteProject};
use crate::network::UploadPolicy;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// reqwest-backed implementation of the remote contract
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    /// Presigned URLs point at the object store; they must not carry our token
    direct_client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AppError::Config(format!("Invalid API token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            // a redirect from the API means the session is gone; surface it instead of following
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client error: {}", e)))?;
        let direct_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            direct_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reachability check: any HTTP answer from the API host counts as online
    pub async fn probe(&self) -> bool {
        match self.client.head(&self.base_url).send().await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Reachability probe failed: {}", e);
                false
            }
        }
    }
}

/// Maps non-success responses onto the error taxonomy
async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let lowered = location.to_ascii_lowercase();
        if ["login", "signin", "sign-in", "auth"]
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return Err(AppError::Unauthorized(format!(
                "redirected to login: {}",
                location
            )));
        }
        return Err(AppError::MalformedResponse(format!(
            "unexpected redirect ({}) to {}",
            status.as_u16(),
            location
        )));
    }

    let message = response.text().await.unwrap_or_default();
    let message = truncate(&message, 200);
    match status {
        StatusCode::UNAUTHORIZED => Err(AppError::Unauthorized(message)),
        StatusCode::NOT_FOUND => Err(AppError::NotFound(message)),
        s if s.is_server_error() => Err(AppError::Server {
            status: s.as_u16(),
            message,
        }),
        s => Err(AppError::Rejected {
            status: s.as_u16(),
            message,
        }),
    }
}

/// Decodes a JSON body, refusing anything that is not declared as JSON
///
/// Captive portals and expired sessions tend to answer with HTML pages and a
/// 200 status.
async fn read_json<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let response = check_status(response).await?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.contains("json") {
        return Err(AppError::MalformedResponse(format!(
            "expected JSON, got '{}'",
            content_type
        )));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::MalformedResponse(format!("invalid JSON body: {}", e)))
}

async fn expect_success(response: Response) -> AppResult<()> {
    check_status(response).await.map(|_| ())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}…", cut)
    }
}

impl RemoteApi for HttpRemote {
    async fn create_project(&self, project: &ProjectPayload) -> AppResult<RemoteProject> {
        let response = self
            .client
            .post(self.url("/projects"))
            .json(project)
            .send()
            .await?;
        read_json(response).await
    }

    async fn update_project(&self, id: &str, project: &ProjectPayload) -> AppResult<()> {
        let response = self
            .client
            .patch(self.url(&format!("/projects/{}", id)))
            .json(project)
            .send()
            .await?;
        expect_success(response).await
    }

    async fn delete_project(&self, id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/projects/{}", id)))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn list_projects(&self) -> AppResult<Vec<RemoteProject>> {
        let response = self.client.get(self.url("/projects")).send().await?;
        read_json(response).await
    }

    async fn list_project_media(&self, project_id: &str) -> AppResult<Vec<RemoteMedia>> {
        let response = self
            .client
            .get(self.url(&format!("/projects/{}/photos", project_id)))
            .send()
            .await?;
        read_json(response).await
    }

    async fn upload_multipart(
        &self,
        project_id: &str,
        upload: MultipartUpload<'_>,
    ) -> AppResult<RemoteMedia> {
        let file = multipart::Part::bytes(upload.blob.to_vec())
            .file_name(upload.metadata.file_name.clone())
            .mime_str(&upload.metadata.mime_type)?;
        let mut form = multipart::Form::new()
            .part("file", file)
            .text("metadata", serde_json::to_string(upload.metadata)?);
        if let Some(thumbnail) = upload.thumbnail {
            let part = multipart::Part::bytes(thumbnail.to_vec())
                .file_name(format!("{}_thumb.webp", upload.metadata.local_id))
                .mime_str("image/webp")?;
            form = form.part("thumbnail", part);
        }

        let response = self
            .client
            .post(self.url(&format!("/projects/{}/photos", project_id)))
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    async fn request_presigned_upload(&self, metadata: &MediaMetadata) -> AppResult<PresignedUpload> {
        let response = self
            .client
            .post(self.url("/photos/presigned-upload"))
            .json(metadata)
            .send()
            .await?;
        read_json(response).await
    }

    async fn put_presigned(&self, upload_url: &str, mime_type: &str, blob: &[u8]) -> AppResult<()> {
        let response = self
            .direct_client
            .put(upload_url)
            .header(CONTENT_TYPE, mime_type)
            .body(blob.to_vec())
            .send()
            .await?;
        expect_success(response).await
    }

    async fn complete_presigned(
        &self,
        session_id: &str,
        metadata: &MediaMetadata,
    ) -> AppResult<RemoteMedia> {
        let response = self
            .client
            .post(self.url(&format!("/photos/complete-presigned/{}", session_id)))
            .json(metadata)
            .send()
            .await?;
        read_json(response).await
    }

    async fn init_chunked_upload(&self, request: &ChunkedInit) -> AppResult<ChunkedSession> {
        let response = self
            .client
            .post(self.url("/uploads/chunked/init"))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn upload_chunk(&self, upload_id: &str, index: u32, chunk: &[u8]) -> AppResult<()> {
        let response = self
            .client
            .post(self.url("/uploads/chunked/chunk"))
            .query(&[("uploadId", upload_id.to_string()), ("chunkIndex", index.to_string())])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(chunk.to_vec())
            .send()
            .await?;
        expect_success(response).await
    }

    async fn complete_chunked_upload(
        &self,
        upload_id: &str,
        metadata: &MediaMetadata,
    ) -> AppResult<RemoteMedia> {
        let response = self
            .client
            .post(self.url(&format!("/uploads/chunked/{}/complete", upload_id)))
            .json(metadata)
            .send()
            .await?;
        read_json(response).await
    }

    async fn update_media(&self, id: &str, patch: &serde_json::Value) -> AppResult<()> {
        let response = self
            .client
            .patch(self.url(&format!("/photos/{}", id)))
            .json(patch)
            .send()
            .await?;
        expect_success(response).await
    }

    async fn delete_media(&self, id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/photos/{}", id)))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn add_photo_tags(&self, photo_id: &str, tag_ids: &[String]) -> AppResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/photos/{}/tags", photo_id)))
            .json(&serde_json::json!({ "tagIds": tag_ids }))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn put_annotation(&self, photo_id: &str, annotation: &serde_json::Value) -> AppResult<()> {
        let response = self
            .client
            .put(self.url(&format!("/photos/{}/annotations", photo_id)))
            .json(annotation)
            .send()
            .await?;
        expect_success(response).await
    }

    async fn delete_annotation(&self, photo_id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/photos/{}/annotations", photo_id)))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn fetch_upload_policy(&self) -> AppResult<UploadPolicy> {
        let response = self
            .client
            .get(self.url("/users/me/upload-policy"))
            .send()
            .await?;
        read_json(response).await
    }
}
