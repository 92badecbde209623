pub mod backoff;
pub mod background_sync;
pub mod media_service;
pub mod merge_service;
pub mod project_service;
pub mod sync_events;
pub mod sync_manager;

pub use sync_events::{ItemError, SyncEvent, SyncProgress, SyncResult};
pub use sync_manager::SyncManager;
