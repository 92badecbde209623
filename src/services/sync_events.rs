use serde::{Deserialize, Serialize};

/// Cumulative counts of the running cycle
///
/// `processed` is always `synced + failed + skipped + dropped`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    /// Increases by one for every batch started in this cycle; the events
    /// before and after a batch carry the same index
    pub batch_index: usize,
    pub total: usize,
    pub processed: usize,
    pub synced: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Items whose local entity was gone; removed without contacting the server
    pub dropped: usize,
}

/// Outcome of one `sync_now` call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub synced: usize,
    pub failed: usize,
    /// Items left in their backoff window
    pub skipped: usize,
    /// The whole cycle was not attempted (offline or policy)
    pub deferred: bool,
    pub requires_reauth: bool,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![reason.into()],
            ..Default::default()
        }
    }

    pub fn deferred(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            deferred: true,
            errors: vec![reason.into()],
            ..Default::default()
        }
    }
}

/// Failure of a single queue item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub item_id: String,
    pub item_type: String,
    pub local_id: String,
    pub message: String,
    pub retry_count: u32,
    /// Dropped from the queue; the entity stays in `error` until retried by hand
    pub permanent: bool,
    pub requires_reauth: bool,
}

/// Messages published to UI subscribers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    SyncProgress { progress: SyncProgress },
    SyncComplete { result: SyncResult },
    SyncError { result: SyncResult, error: String },
    ItemError { error: ItemError },
}
