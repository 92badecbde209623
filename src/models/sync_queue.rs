use rusqlite::Row;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Entity kind a queued mutation targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SyncItemType {
    Project,
    Photo,
    Annotation,
}

impl SyncItemType {
    /// Partitions in dispatch order: a photo references a project, an
    /// annotation references a photo.
    pub const DISPATCH_ORDER: [SyncItemType; 3] = [
        SyncItemType::Project,
        SyncItemType::Photo,
        SyncItemType::Annotation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncItemType::Project => "project",
            SyncItemType::Photo => "photo",
            SyncItemType::Annotation => "annotation",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "project" => SyncItemType::Project,
            "annotation" => SyncItemType::Annotation,
            _ => SyncItemType::Photo,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Update => "update",
            SyncAction::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "update" => SyncAction::Update,
            "delete" => SyncAction::Delete,
            _ => SyncAction::Create,
        }
    }
}

/// Stable queue id for one logical mutation.
///
/// Enqueuing the same `(type, local id, action)` again maps onto the same
/// row, which is how duplicate taps on "retry" collapse into one item.
pub fn deterministic_id(item_type: SyncItemType, local_id: &str, action: SyncAction) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item_type.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(local_id.as_bytes());
    hasher.update(b":");
    hasher.update(action.as_str().as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// A durable record describing one pending mutation against a remote entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncQueueItem {
    pub id: String,
    pub item_type: SyncItemType,
    pub local_id: String,
    pub project_id: Option<String>,
    pub action: SyncAction,
    pub data: serde_json::Value,
    pub retry_count: u32,
    pub last_attempt: Option<i64>,
    pub created_at: i64,
    pub error: Option<String>,
}

impl TryFrom<&Row<'_>> for SyncQueueItem {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        let item_type: String = row.get("item_type")?;
        let action: String = row.get("action")?;
        let data: String = row.get("data")?;
        Ok(SyncQueueItem {
            id: row.get("id")?,
            item_type: SyncItemType::from_str(&item_type),
            local_id: row.get("local_id")?,
            project_id: row.get("project_id")?,
            action: SyncAction::from_str(&action),
            data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
            retry_count: row.get("retry_count")?,
            last_attempt: row.get("last_attempt")?,
            created_at: row.get("created_at")?,
            error: row.get("error")?,
        })
    }
}

/// Input for enqueuing a mutation; the id is derived, never chosen
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncItem {
    pub item_type: SyncItemType,
    pub local_id: String,
    pub project_id: Option<String>,
    pub action: SyncAction,
    pub data: serde_json::Value,
}

impl NewSyncItem {
    pub fn new(item_type: SyncItemType, local_id: impl Into<String>, action: SyncAction) -> Self {
        Self {
            item_type,
            local_id: local_id.into(),
            project_id: None,
            action,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_project(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn id(&self) -> String {
        deterministic_id(self.item_type, &self.local_id, self.action)
    }
}

/// Attempt bookkeeping written back after a failed dispatch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncQueuePatch {
    pub retry_count: Option<u32>,
    pub last_attempt: Option<i64>,
    pub error: Option<String>,
    pub data: Option<serde_json::Value>,
}
