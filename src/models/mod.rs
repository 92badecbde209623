pub mod project;
pub mod remote;
pub mod sync_queue;
pub mod upload_session;

pub use media_library::{LocalMedia, MediaSyncStatus, MediaType, NewMedia};
pub use project::{LocalProject, ProjectSyncStatus};
pub use remote::{RemoteMedia, RemoteProject};
pub use sync_queue::{
    deterministic_id, NewSyncItem, SyncAction, SyncItemType, SyncQueueItem, SyncQueuePatch,
};
pub use upload_session::UploadSession;
