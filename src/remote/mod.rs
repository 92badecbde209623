//! Remote API contract consumed by the sync engine
//!
//! The engine never talks HTTP directly; it goes through [`RemoteApi`], which
//! [`http::HttpRemote`] implements with reqwest and tests implement in memory.

pub mod http;

use crate::error::AppResult;
use crate::models::{RemoteMedia, RemoteProject};
use crate::network::UploadPolicy;
use serde::{Deserialize, Serialize};

pub use http::HttpRemote;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Descriptive fields sent with every media upload path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub project_id: String,
    pub local_id: String,
    pub media_type: String,
    pub mime_type: String,
    pub file_name: String,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Single-request upload body for small payloads
#[derive(Debug, Clone, Copy)]
pub struct MultipartUpload<'a> {
    pub metadata: &'a MediaMetadata,
    pub blob: &'a [u8],
    pub thumbnail: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresignedUpload {
    #[serde(rename = "uploadURL", alias = "uploadUrl")]
    pub upload_url: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedInit {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub chunk_size: u64,
    pub total_chunks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedSession {
    pub upload_id: String,
    #[serde(default)]
    pub total_chunks: Option<u32>,
}

/// Narrow request/response contract with the remote authority
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    async fn create_project(&self, project: &ProjectPayload) -> AppResult<RemoteProject>;
    async fn update_project(&self, id: &str, project: &ProjectPayload) -> AppResult<()>;
    async fn delete_project(&self, id: &str) -> AppResult<()>;
    async fn list_projects(&self) -> AppResult<Vec<RemoteProject>>;
    async fn list_project_media(&self, project_id: &str) -> AppResult<Vec<RemoteMedia>>;

    async fn upload_multipart(
        &self,
        project_id: &str,
        upload: MultipartUpload<'_>,
    ) -> AppResult<RemoteMedia>;

    async fn request_presigned_upload(&self, metadata: &MediaMetadata) -> AppResult<PresignedUpload>;
    async fn put_presigned(&self, upload_url: &str, mime_type: &str, blob: &[u8]) -> AppResult<()>;
    async fn complete_presigned(
        &self,
        session_id: &str,
        metadata: &MediaMetadata,
    ) -> AppResult<RemoteMedia>;

    async fn init_chunked_upload(&self, request: &ChunkedInit) -> AppResult<ChunkedSession>;
    async fn upload_chunk(&self, upload_id: &str, index: u32, chunk: &[u8]) -> AppResult<()>;
    async fn complete_chunked_upload(
        &self,
        upload_id: &str,
        metadata: &MediaMetadata,
    ) -> AppResult<RemoteMedia>;

    async fn update_media(&self, id: &str, patch: &serde_json::Value) -> AppResult<()>;
    async fn delete_media(&self, id: &str) -> AppResult<()>;
    async fn add_photo_tags(&self, photo_id: &str, tag_ids: &[String]) -> AppResult<()>;
    async fn put_annotation(&self, photo_id: &str, annotation: &serde_json::Value) -> AppResult<()>;
    async fn delete_annotation(&self, photo_id: &str) -> AppResult<()>;

    async fn fetch_upload_policy(&self) -> AppResult<UploadPolicy>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presigned_field_names() {
        let parsed: PresignedUpload =
            serde_json::from_str(r#"{"uploadURL":"https://s3/x","sessionId":"s1"}"#).unwrap();
        assert_eq!(parsed.upload_url, "https://s3/x");
        assert_eq!(parsed.session_id, "s1");
    }

    #[test]
    fn test_metadata_skips_empty_fields() {
        let metadata = MediaMetadata {
            project_id: "p".into(),
            local_id: "l".into(),
            media_type: "photo".into(),
            mime_type: "image/jpeg".into(),
            file_name: "l.jpg".into(),
            file_size: 3,
            caption: None,
            width: None,
            height: None,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["projectId"], "p");
        assert!(json.get("caption").is_none());
    }
}
