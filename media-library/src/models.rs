use serde::{Deserialize, Serialize};

/// Kind of captured media
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "video" => MediaType::Video,
            _ => MediaType::Photo,
        }
    }
}

/// Upload state of a locally captured item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaSyncStatus {
    Pending,
    Syncing,
    Synced,
    Error,
}

impl MediaSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaSyncStatus::Pending => "pending",
            MediaSyncStatus::Syncing => "syncing",
            MediaSyncStatus::Synced => "synced",
            MediaSyncStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "syncing" => MediaSyncStatus::Syncing,
            "synced" => MediaSyncStatus::Synced,
            "error" => MediaSyncStatus::Error,
            _ => MediaSyncStatus::Pending,
        }
    }
}

/// A photo or video captured on this device.
///
/// `project_id` is always a server project id. Captures made against a
/// project that only exists locally carry `local_project_id` instead until
/// the project is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalMedia {
    pub id: String,
    pub server_id: Option<String>,
    pub project_id: Option<String>,
    pub local_project_id: Option<String>,
    pub media_type: MediaType,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: String,
    /// Empty once the upload is confirmed and the blob released
    #[serde(skip)]
    pub blob: Vec<u8>,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    pub blob_size: u64,
    pub sync_status: MediaSyncStatus,
    pub retry_count: u32,
    pub last_attempt: Option<i64>,
    pub error: Option<String>,
    pub pending_tag_ids: Vec<String>,
    pub created_at: i64,
    /// Set once the user deleted it; the row goes when the server confirms
    pub deleted_at: Option<i64>,
    /// Last annotation saved on this device; `Some(Null)` after a local delete
    pub annotation: Option<serde_json::Value>,
}

impl LocalMedia {
    /// Deleted locally and waiting for the server, as opposed to a failed delete
    pub fn is_pending_delete(&self) -> bool {
        self.deleted_at.is_some() && self.sync_status != MediaSyncStatus::Error
    }
}

/// Input for a fresh capture
#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub project_id: Option<String>,
    pub local_project_id: Option<String>,
    pub media_type: MediaType,
    pub caption: Option<String>,
    pub mime_type: String,
    pub blob: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
    pub tag_ids: Vec<String>,
}

/// Configuration for the media library
#[derive(Debug, Clone)]
pub struct MediaLibraryConfig {
    /// Directory where transient display files are materialized
    pub display_cache_dir: String,
    pub thumbnail_size: u32,
}

impl Default for MediaLibraryConfig {
    fn default() -> Self {
        Self {
            display_cache_dir: "./cache/display".to_string(),
            thumbnail_size: 512,
        }
    }
}
