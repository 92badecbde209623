//! Durable local store
//!
//! The only component that owns disk state. Everything the sync engine knows
//! about projects, captures and pending mutations goes through [`LocalStore`].
//! Calls are async: each one waits for the connection lock, which is the
//! store's single point of serialization.

pub mod schema;

use crate::error::{AppError, AppResult};
use crate::models::{
    LocalMedia, LocalProject, MediaSyncStatus, NewMedia, NewSyncItem, ProjectSyncStatus,
    SyncItemType, SyncQueueItem, SyncQueuePatch, UploadSession,
};
use media_library::{DisplayHandle, MediaLibraryConfig, MediaLibraryService};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tokio::sync::Mutex;

pub struct LocalStore {
    conn: Mutex<Connection>,
    media: MediaLibraryService,
    max_queue_size: usize,
}

impl LocalStore {
    /// Opens (and migrates) the database at `path`
    pub fn open(
        path: &Path,
        max_queue_size: usize,
        media_config: MediaLibraryConfig,
    ) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, max_queue_size, media_config)
    }

    pub fn open_in_memory(max_queue_size: usize) -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, max_queue_size, MediaLibraryConfig::default())
    }

    fn with_connection(
        conn: Connection,
        max_queue_size: usize,
        media_config: MediaLibraryConfig,
    ) -> AppResult<Self> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            media: MediaLibraryService::new(media_config),
            max_queue_size,
        })
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    // ---- sync queue ----

    /// Enqueues a mutation, or returns the live item with the same id.
    ///
    /// Lookup, capacity check and insert run in one immediate transaction, so
    /// concurrent calls for the same logical mutation converge on one row and
    /// a full queue is rejected without touching existing items.
    pub async fn add_to_sync_queue(
        &self,
        item: NewSyncItem,
        now_ms: i64,
    ) -> AppResult<SyncQueueItem> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = enqueue(&tx, item, now_ms, self.max_queue_size)?;
        tx.commit()?;
        Ok(stored)
    }

    /// All live queue items; ordering is left to the caller
    pub async fn get_pending_sync_items(&self) -> AppResult<Vec<SyncQueueItem>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT * FROM sync_queue ORDER BY created_at DESC")?;
        let items = stmt
            .query_map([], |row| SyncQueueItem::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub async fn get_sync_queue_item(&self, id: &str) -> AppResult<Option<SyncQueueItem>> {
        let conn = self.conn.lock().await;
        query_queue_item(&conn, id)
    }

    /// Applies attempt bookkeeping; `retry_count` never decreases
    pub async fn update_sync_queue_item(&self, id: &str, patch: SyncQueuePatch) -> AppResult<()> {
        let data = patch.data.as_ref().map(serde_json::to_string).transpose()?;
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE sync_queue SET
                retry_count = MAX(retry_count, COALESCE(?1, retry_count)),
                last_attempt = COALESCE(?2, last_attempt),
                error = COALESCE(?3, error),
                data = COALESCE(?4, data)
             WHERE id = ?5",
            params![patch.retry_count, patch.last_attempt, patch.error, data, id],
        )?;
        if rows == 0 {
            return Err(AppError::NotFound(format!("queue item {}", id)));
        }
        Ok(())
    }

    pub async fn remove_from_sync_queue(&self, id: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Drops every queued mutation for one entity
    pub async fn remove_sync_items_for(
        &self,
        item_type: SyncItemType,
        local_id: &str,
    ) -> AppResult<usize> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "DELETE FROM sync_queue WHERE item_type = ?1 AND local_id = ?2",
            params![item_type.as_str(), local_id],
        )?;
        Ok(rows)
    }

    pub async fn get_queue_size(&self) -> AppResult<usize> {
        let conn = self.conn.lock().await;
        let size: i64 = conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(size as usize)
    }

    // ---- projects ----

    pub async fn insert_project(&self, project: &LocalProject) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO projects (id, server_id, name, description, sync_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                project.id,
                project.server_id,
                project.name,
                project.description,
                project.sync_status.as_str(),
                project.created_at,
                project.updated_at,
            ],
        )?;
        Ok(())
    }

    pub async fn get_project(&self, id: &str) -> AppResult<Option<LocalProject>> {
        let conn = self.conn.lock().await;
        let project = conn
            .query_row("SELECT * FROM projects WHERE id = ?1", params![id], |row| {
                LocalProject::try_from(row)
            })
            .optional()?;
        Ok(project)
    }

    /// All local projects, newest first
    pub async fn get_all_projects(&self) -> AppResult<Vec<LocalProject>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY created_at DESC")?;
        let projects = stmt
            .query_map([], |row| LocalProject::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub async fn update_project_fields(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        now_ms: i64,
    ) -> AppResult<()> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE projects SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![name, description, now_ms, id],
        )?;
        if rows == 0 {
            return Err(AppError::NotFound(format!("project {}", id)));
        }
        Ok(())
    }

    /// Records the server id of a confirmed project and re-points captures
    /// that were taken while it was still local.
    pub async fn mark_project_synced(&self, id: &str, server_id: &str, now_ms: i64) -> AppResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE projects SET server_id = ?1, sync_status = 'synced', updated_at = ?2 WHERE id = ?3",
            params![server_id, now_ms, id],
        )?;
        let attached = self.media.attach_to_server_project(&tx, id, server_id)?;
        tx.commit()?;
        if attached > 0 {
            log::info!(
                "Project {} confirmed as {}; attached {} pending captures",
                id,
                server_id,
                attached
            );
        }
        Ok(())
    }

    /// Points captures of a local project at its server id
    pub async fn attach_media_to_server_project(
        &self,
        local_project_id: &str,
        server_project_id: &str,
    ) -> AppResult<usize> {
        let conn = self.conn.lock().await;
        Ok(self
            .media
            .attach_to_server_project(&conn, local_project_id, server_project_id)?)
    }

    pub async fn set_project_status(&self, id: &str, status: ProjectSyncStatus) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE projects SET sync_status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    /// Removes a project with its captures and everything queued for them
    pub async fn delete_project(&self, id: &str) -> AppResult<()> {
        match self.withdraw_project(id, None, 0).await {
            Ok(_) | Err(AppError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Takes a project and its captures out of the user's view
    ///
    /// Without `remote_delete` the rows are removed. With it, the delete is
    /// queued and the rows are only flagged, in the same transaction; a full
    /// queue leaves everything as it was. Returns the number of captures.
    pub async fn withdraw_project(
        &self,
        id: &str,
        remote_delete: Option<NewSyncItem>,
        now_ms: i64,
    ) -> AppResult<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let server_id: Option<Option<String>> = tx
            .query_row(
                "SELECT server_id FROM projects WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(server_id) = server_id else {
            return Err(AppError::NotFound(format!("project {}", id)));
        };

        let media_ids = self
            .media
            .list_ids_for_project(&tx, id, server_id.as_deref())?;
        for media_id in &media_ids {
            remove_media_items(&tx, media_id)?;
        }
        tx.execute(
            "DELETE FROM sync_queue WHERE item_type = 'project' AND local_id = ?1",
            params![id],
        )?;

        match remote_delete {
            Some(item) => {
                enqueue(&tx, item, now_ms, self.max_queue_size)?;
                for media_id in &media_ids {
                    self.media.mark_deleted(&tx, media_id, now_ms)?;
                    tx.execute(
                        "DELETE FROM upload_sessions WHERE media_id = ?1",
                        params![media_id],
                    )?;
                }
                tx.execute(
                    "UPDATE projects SET deleted_at = ?1, sync_status = 'pending' WHERE id = ?2",
                    params![now_ms, id],
                )?;
            }
            None => {
                for media_id in &media_ids {
                    self.purge_media(&tx, media_id)?;
                }
                tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
            }
        }
        tx.commit()?;
        Ok(media_ids.len())
    }

    // ---- media ----

    pub async fn insert_media(&self, media: NewMedia, now_ms: i64) -> AppResult<LocalMedia> {
        let conn = self.conn.lock().await;
        Ok(self.media.insert_media(&conn, media, now_ms)?)
    }

    pub async fn get_photo(&self, id: &str) -> AppResult<Option<LocalMedia>> {
        let conn = self.conn.lock().await;
        Ok(self.media.get_media(&conn, id)?)
    }

    /// Media attached to a server project, newest first
    pub async fn get_project_photos(&self, server_project_id: &str) -> AppResult<Vec<LocalMedia>> {
        let conn = self.conn.lock().await;
        Ok(self.media.list_by_project(&conn, server_project_id)?)
    }

    pub async fn get_local_project_photos(&self, local_project_id: &str) -> AppResult<Vec<LocalMedia>> {
        let conn = self.conn.lock().await;
        Ok(self.media.list_by_local_project(&conn, local_project_id)?)
    }

    pub async fn update_media_status(&self, id: &str, status: MediaSyncStatus) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self.media.update_status(&conn, id, status)?)
    }

    pub async fn mark_media_synced(&self, id: &str, server_id: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self.media.mark_synced(&conn, id, server_id)?)
    }

    pub async fn record_media_failure(
        &self,
        id: &str,
        status: MediaSyncStatus,
        retry_count: u32,
        attempted_at: i64,
        error: &str,
    ) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self
            .media
            .record_failure(&conn, id, status, retry_count, attempted_at, error)?)
    }

    pub async fn reset_media_for_retry(&self, id: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self.media.reset_for_retry(&conn, id)?)
    }

    pub async fn update_media_caption(&self, id: &str, caption: Option<&str>) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self.media.update_caption(&conn, id, caption)?)
    }

    pub async fn set_pending_tags(&self, id: &str, tags: &[String]) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self.media.set_pending_tags(&conn, id, tags)?)
    }

    pub async fn media_with_pending_tags(&self) -> AppResult<Vec<LocalMedia>> {
        let conn = self.conn.lock().await;
        Ok(self.media.list_with_pending_tags(&conn)?)
    }

    pub async fn release_media_blob(&self, id: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self.media.release_blob(&conn, id)?)
    }

    pub async fn delete_media(&self, id: &str) -> AppResult<()> {
        self.withdraw_media(id, None, 0).await
    }

    /// Same as [`Self::withdraw_project`] for a single capture
    pub async fn withdraw_media(
        &self,
        id: &str,
        remote_delete: Option<NewSyncItem>,
        now_ms: i64,
    ) -> AppResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        remove_media_items(&tx, id)?;
        match remote_delete {
            Some(item) => {
                enqueue(&tx, item, now_ms, self.max_queue_size)?;
                self.media.mark_deleted(&tx, id, now_ms)?;
                tx.execute("DELETE FROM upload_sessions WHERE media_id = ?1", params![id])?;
            }
            None => self.purge_media(&tx, id)?,
        }
        tx.commit()?;
        Ok(())
    }

    fn purge_media(&self, conn: &Connection, id: &str) -> AppResult<()> {
        self.media.delete_media(conn, id)?;
        conn.execute("DELETE FROM upload_sessions WHERE media_id = ?1", params![id])?;
        Ok(())
    }

    /// Keeps the latest annotation so a failed upload of it can be retried
    pub async fn set_media_annotation(
        &self,
        id: &str,
        annotation: &serde_json::Value,
    ) -> AppResult<()> {
        let conn = self.conn.lock().await;
        Ok(self.media.set_annotation(&conn, id, annotation)?)
    }

    /// Materializes a local blob for rendering; the caller owns the handle
    pub async fn open_display_handle(&self, id: &str) -> AppResult<DisplayHandle> {
        let conn = self.conn.lock().await;
        Ok(self.media.open_display_handle(&conn, id)?)
    }

    // ---- chunked upload sessions ----

    pub async fn get_upload_session(&self, media_id: &str) -> AppResult<Option<UploadSession>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT media_id, upload_id, total_chunks, chunk_size, completed_chunks, created_at
                 FROM upload_sessions WHERE media_id = ?1",
                params![media_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((media_id, upload_id, total_chunks, chunk_size, completed, created_at)) => {
                Ok(Some(UploadSession {
                    media_id,
                    upload_id,
                    total_chunks,
                    chunk_size: chunk_size as u64,
                    completed_chunks: serde_json::from_str(&completed)?,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn save_upload_session(&self, session: &UploadSession) -> AppResult<()> {
        let completed = serde_json::to_string(&session.completed_chunks)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO upload_sessions (media_id, upload_id, total_chunks, chunk_size, completed_chunks, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(media_id) DO UPDATE SET
                upload_id = excluded.upload_id,
                total_chunks = excluded.total_chunks,
                chunk_size = excluded.chunk_size,
                completed_chunks = excluded.completed_chunks,
                created_at = excluded.created_at",
            params![
                session.media_id,
                session.upload_id,
                session.total_chunks,
                session.chunk_size as i64,
                completed,
                session.created_at,
            ],
        )?;
        Ok(())
    }

    /// Records one confirmed chunk; read-modify-write under the connection lock
    pub async fn mark_chunk_uploaded(&self, media_id: &str, index: u32) -> AppResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let completed: Option<String> = tx
            .query_row(
                "SELECT completed_chunks FROM upload_sessions WHERE media_id = ?1",
                params![media_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(completed) = completed else {
            return Err(AppError::NotFound(format!("upload session for {}", media_id)));
        };
        let mut chunks: Vec<u32> = serde_json::from_str(&completed)?;
        if !chunks.contains(&index) {
            chunks.push(index);
            chunks.sort_unstable();
        }
        tx.execute(
            "UPDATE upload_sessions SET completed_chunks = ?1 WHERE media_id = ?2",
            params![serde_json::to_string(&chunks)?, media_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub async fn clear_upload_session(&self, media_id: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM upload_sessions WHERE media_id = ?1",
            params![media_id],
        )?;
        Ok(())
    }
}

/// Lookup, capacity check and insert; the caller owns the transaction
///
/// A live item with the same id is returned as is, even on a full queue.
fn enqueue(
    conn: &Connection,
    item: NewSyncItem,
    now_ms: i64,
    max_queue_size: usize,
) -> AppResult<SyncQueueItem> {
    let id = item.id();
    if let Some(existing) = query_queue_item(conn, &id)? {
        log::debug!(
            "Queue item {} already live for {} {}",
            id,
            existing.item_type.as_str(),
            existing.local_id
        );
        return Ok(existing);
    }

    let size: i64 = conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
    if size as usize >= max_queue_size {
        log::warn!(
            "Rejecting {} {} for {}: queue full",
            item.action.as_str(),
            item.item_type.as_str(),
            item.local_id
        );
        return Err(AppError::QueueFull {
            max: max_queue_size,
        });
    }

    conn.execute(
        "INSERT INTO sync_queue (id, item_type, local_id, project_id, action, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO NOTHING",
        params![
            id,
            item.item_type.as_str(),
            item.local_id,
            item.project_id,
            item.action.as_str(),
            serde_json::to_string(&item.data)?,
            now_ms,
        ],
    )?;

    let stored = query_queue_item(conn, &id)?
        .ok_or_else(|| AppError::NotFound(format!("queue item {}", id)))?;
    log::debug!(
        "Enqueued {} {} for {} as {}",
        stored.action.as_str(),
        stored.item_type.as_str(),
        stored.local_id,
        stored.id
    );
    Ok(stored)
}

/// Photo and annotation mutations queued for one capture
fn remove_media_items(conn: &Connection, media_id: &str) -> AppResult<usize> {
    let rows = conn.execute(
        "DELETE FROM sync_queue WHERE item_type IN ('photo', 'annotation') AND local_id = ?1",
        params![media_id],
    )?;
    Ok(rows)
}

fn query_queue_item(conn: &Connection, id: &str) -> AppResult<Option<SyncQueueItem>> {
    let item = conn
        .query_row("SELECT * FROM sync_queue WHERE id = ?1", params![id], |row| {
            SyncQueueItem::try_from(row)
        })
        .optional()?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, SyncAction};

    fn store(max: usize) -> LocalStore {
        LocalStore::open_in_memory(max).unwrap()
    }

    fn photo_create(local_id: &str) -> NewSyncItem {
        NewSyncItem::new(SyncItemType::Photo, local_id, SyncAction::Create)
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let store = store(10);
        let first = store.add_to_sync_queue(photo_create("m1"), 1).await.unwrap();
        let second = store.add_to_sync_queue(photo_create("m1"), 2).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, 1);
        assert_eq!(store.get_queue_size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_enqueue_converges() {
        let store = store(10);
        let (a, b) = tokio::join!(
            store.add_to_sync_queue(photo_create("m1"), 1),
            store.add_to_sync_queue(photo_create("m1"), 1)
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(store.get_queue_size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_capacity_rejects_and_leaves_queue_unchanged() {
        let store = store(2);
        store.add_to_sync_queue(photo_create("a"), 1).await.unwrap();
        store.add_to_sync_queue(photo_create("b"), 2).await.unwrap();

        let err = store.add_to_sync_queue(photo_create("c"), 3).await.unwrap_err();
        assert!(matches!(err, AppError::QueueFull { max: 2 }));
        assert_eq!(store.get_queue_size().await.unwrap(), 2);

        // an already-live mutation is still returned when the queue is full
        let again = store.add_to_sync_queue(photo_create("a"), 4).await.unwrap();
        assert_eq!(again.local_id, "a");
    }

    #[tokio::test]
    async fn test_retry_count_never_decreases() {
        let store = store(10);
        let item = store.add_to_sync_queue(photo_create("m1"), 1).await.unwrap();

        store
            .update_sync_queue_item(
                &item.id,
                SyncQueuePatch {
                    retry_count: Some(3),
                    last_attempt: Some(10),
                    error: Some("timeout".into()),
                    data: None,
                },
            )
            .await
            .unwrap();
        store
            .update_sync_queue_item(
                &item.id,
                SyncQueuePatch {
                    retry_count: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = store.get_sync_queue_item(&item.id).await.unwrap().unwrap();
        assert_eq!(loaded.retry_count, 3);
        assert_eq!(loaded.last_attempt, Some(10));
        assert_eq!(loaded.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_project_confirmation_attaches_media() {
        let store = store(10);
        let project = LocalProject::new("Site A".into(), None, 1);
        store.insert_project(&project).await.unwrap();

        let media = store
            .insert_media(
                NewMedia {
                    project_id: None,
                    local_project_id: Some(project.id.clone()),
                    media_type: MediaType::Video,
                    caption: None,
                    mime_type: "video/mp4".into(),
                    blob: vec![0; 16],
                    thumbnail: None,
                    tag_ids: vec![],
                },
                2,
            )
            .await
            .unwrap();

        store.mark_project_synced(&project.id, "srv-p", 3).await.unwrap();

        let loaded = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(loaded.server_id.as_deref(), Some("srv-p"));
        assert_eq!(loaded.sync_status, ProjectSyncStatus::Synced);

        let photos = store.get_project_photos("srv-p").await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, media.id);
    }

    #[tokio::test]
    async fn test_attach_is_a_no_op_once_attached() {
        let store = store(10);
        let project = LocalProject::new("Site B".into(), None, 1);
        store.insert_project(&project).await.unwrap();
        store
            .insert_media(
                NewMedia {
                    project_id: None,
                    local_project_id: Some(project.id.clone()),
                    media_type: MediaType::Photo,
                    caption: None,
                    mime_type: "image/jpeg".into(),
                    blob: vec![1; 8],
                    thumbnail: None,
                    tag_ids: vec![],
                },
                2,
            )
            .await
            .unwrap();

        let attached = store
            .attach_media_to_server_project(&project.id, "srv-b")
            .await
            .unwrap();
        assert_eq!(attached, 1);
        let again = store
            .attach_media_to_server_project(&project.id, "srv-b")
            .await
            .unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_display_handle_for_pending_capture() {
        let store = store(10);
        let media = store
            .insert_media(
                NewMedia {
                    project_id: Some("srv-p".into()),
                    local_project_id: None,
                    media_type: MediaType::Video,
                    caption: None,
                    mime_type: "video/mp4".into(),
                    blob: vec![0; 32],
                    thumbnail: Some(vec![9; 4]),
                    tag_ids: vec![],
                },
                1,
            )
            .await
            .unwrap();

        let handle = store.open_display_handle(&media.id).await.unwrap();
        let path = handle.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), vec![9; 4]);
        drop(handle);
        assert!(!path.exists());
    }

    fn capture_for(project: &LocalProject) -> NewMedia {
        NewMedia {
            project_id: project.server_id.clone(),
            local_project_id: Some(project.id.clone()),
            media_type: MediaType::Photo,
            caption: None,
            mime_type: "image/jpeg".into(),
            blob: vec![3; 8],
            thumbnail: None,
            tag_ids: vec![],
        }
    }

    fn project_delete(project_id: &str) -> NewSyncItem {
        NewSyncItem::new(SyncItemType::Project, project_id, SyncAction::Delete)
            .with_data(serde_json::json!({ "serverId": "srv-p" }))
    }

    #[tokio::test]
    async fn test_withdraw_project_flags_rows_until_confirmed() {
        let store = store(10);
        let project = LocalProject::new("Site C".into(), None, 1);
        store.insert_project(&project).await.unwrap();
        store.mark_project_synced(&project.id, "srv-p", 2).await.unwrap();
        let project = store.get_project(&project.id).await.unwrap().unwrap();
        let media = store.insert_media(capture_for(&project), 3).await.unwrap();
        store
            .add_to_sync_queue(photo_create(&media.id), 3)
            .await
            .unwrap();

        let count = store
            .withdraw_project(&project.id, Some(project_delete(&project.id)), 4)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let flagged = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(flagged.deleted_at, Some(4));
        assert!(flagged.is_pending_delete());
        let flagged_media = store.get_photo(&media.id).await.unwrap().unwrap();
        assert_eq!(flagged_media.deleted_at, Some(4));

        let items = store.get_pending_sync_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].action, SyncAction::Delete);
        assert_eq!(items[0].item_type, SyncItemType::Project);

        store.delete_project(&project.id).await.unwrap();
        assert!(store.get_project(&project.id).await.unwrap().is_none());
        assert!(store.get_photo(&media.id).await.unwrap().is_none());
        // already gone is fine
        store.delete_project(&project.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_withdraw_on_full_queue_changes_nothing() {
        let store = store(2);
        let project = LocalProject::new("Site D".into(), None, 1);
        store.insert_project(&project).await.unwrap();
        store.mark_project_synced(&project.id, "srv-p", 2).await.unwrap();
        let project = store.get_project(&project.id).await.unwrap().unwrap();
        let media = store.insert_media(capture_for(&project), 3).await.unwrap();
        store.mark_media_synced(&media.id, "srv-m").await.unwrap();
        store.add_to_sync_queue(photo_create("a"), 4).await.unwrap();
        store.add_to_sync_queue(photo_create("b"), 5).await.unwrap();

        let err = store
            .withdraw_project(&project.id, Some(project_delete(&project.id)), 6)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QueueFull { max: 2 }));

        let media_delete = NewSyncItem::new(SyncItemType::Photo, &media.id, SyncAction::Delete)
            .with_data(serde_json::json!({ "serverId": "srv-m" }));
        let err = store
            .withdraw_media(&media.id, Some(media_delete), 6)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QueueFull { max: 2 }));

        let kept = store.get_project(&project.id).await.unwrap().unwrap();
        assert!(kept.deleted_at.is_none());
        let kept_media = store.get_photo(&media.id).await.unwrap().unwrap();
        assert!(kept_media.deleted_at.is_none());
        assert_eq!(kept_media.sync_status, MediaSyncStatus::Synced);
        let ids: Vec<String> = store
            .get_pending_sync_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.local_id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_withdraw_unconfirmed_media_removes_it() {
        let store = store(10);
        let media = store
            .insert_media(
                NewMedia {
                    project_id: Some("srv-p".into()),
                    local_project_id: None,
                    media_type: MediaType::Photo,
                    caption: None,
                    mime_type: "image/jpeg".into(),
                    blob: vec![5; 8],
                    thumbnail: None,
                    tag_ids: vec![],
                },
                1,
            )
            .await
            .unwrap();
        store
            .add_to_sync_queue(photo_create(&media.id), 1)
            .await
            .unwrap();

        store.withdraw_media(&media.id, None, 2).await.unwrap();
        assert!(store.get_photo(&media.id).await.unwrap().is_none());
        assert_eq!(store.get_queue_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_session_lifecycle() {
        let store = store(10);
        let session = UploadSession {
            media_id: "m1".into(),
            upload_id: "up-1".into(),
            total_chunks: 3,
            chunk_size: 10,
            completed_chunks: vec![],
            created_at: 5,
        };
        store.save_upload_session(&session).await.unwrap();
        store.mark_chunk_uploaded("m1", 2).await.unwrap();
        store.mark_chunk_uploaded("m1", 0).await.unwrap();
        store.mark_chunk_uploaded("m1", 2).await.unwrap();

        let loaded = store.get_upload_session("m1").await.unwrap().unwrap();
        assert_eq!(loaded.completed_chunks, vec![0, 2]);
        assert_eq!(loaded.missing_chunks(), vec![1]);

        store.clear_upload_session("m1").await.unwrap();
        assert!(store.get_upload_session("m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_keeps_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldcam.db");
        {
            let store = LocalStore::open(&path, 10, MediaLibraryConfig::default()).unwrap();
            store.add_to_sync_queue(photo_create("m1"), 1).await.unwrap();
        }
        let store = LocalStore::open(&path, 10, MediaLibraryConfig::default()).unwrap();
        let items = store.get_pending_sync_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].local_id, "m1");
    }
}
