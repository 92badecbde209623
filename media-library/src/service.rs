use crate::display::DisplayHandle;
use crate::models::{LocalMedia, MediaLibraryConfig, MediaSyncStatus, MediaType, NewMedia};
use crate::thumbnail::{image_dimensions, ThumbnailError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

/// Error type for media library operations
#[derive(Debug)]
pub enum MediaLibraryError {
    DatabaseError(rusqlite::Error),
    ThumbnailError(ThumbnailError),
    NotFound(String),
    IoError(std::io::Error),
    Other(String),
}

impl std::fmt::Display for MediaLibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaLibraryError::DatabaseError(e) => write!(f, "Database error: {}", e),
            MediaLibraryError::ThumbnailError(e) => write!(f, "Thumbnail error: {}", e),
            MediaLibraryError::NotFound(msg) => write!(f, "Not found: {}", msg),
            MediaLibraryError::IoError(e) => write!(f, "IO error: {}", e),
            MediaLibraryError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MediaLibraryError {}

impl From<rusqlite::Error> for MediaLibraryError {
    fn from(err: rusqlite::Error) -> Self {
        MediaLibraryError::DatabaseError(err)
    }
}

impl From<ThumbnailError> for MediaLibraryError {
    fn from(err: ThumbnailError) -> Self {
        MediaLibraryError::ThumbnailError(err)
    }
}

impl From<std::io::Error> for MediaLibraryError {
    fn from(err: std::io::Error) -> Self {
        MediaLibraryError::IoError(err)
    }
}

pub type MediaResult<T> = Result<T, MediaLibraryError>;

const MEDIA_COLUMNS: &str = "id, server_id, project_id, local_project_id, media_type, caption, width, height,
     mime_type, blob, thumbnail, blob_size, sync_status, retry_count, last_attempt, error,
     pending_tag_ids, created_at, deleted_at, annotation";

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<LocalMedia> {
    let media_type: String = row.get(4)?;
    let status: String = row.get(12)?;
    let tags_json: String = row.get(16)?;
    let annotation: Option<String> = row.get(19)?;
    Ok(LocalMedia {
        id: row.get(0)?,
        server_id: row.get(1)?,
        project_id: row.get(2)?,
        local_project_id: row.get(3)?,
        media_type: MediaType::from_str(&media_type),
        caption: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        mime_type: row.get(8)?,
        blob: row.get(9)?,
        thumbnail: row.get(10)?,
        blob_size: row.get::<_, i64>(11)? as u64,
        sync_status: MediaSyncStatus::from_str(&status),
        retry_count: row.get(13)?,
        last_attempt: row.get(14)?,
        error: row.get(15)?,
        pending_tag_ids: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: row.get(17)?,
        deleted_at: row.get(18)?,
        annotation: annotation.and_then(|json| serde_json::from_str(&json).ok()),
    })
}

/// Media library service
///
/// Stateless apart from its configuration; every call takes the connection
/// owned by the caller.
pub struct MediaLibraryService {
    config: MediaLibraryConfig,
}

impl MediaLibraryService {
    pub fn new(config: MediaLibraryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MediaLibraryConfig {
        &self.config
    }

    /// Stores a new capture with `sync_status = pending` and returns its local id
    pub fn insert_media(
        &self,
        conn: &Connection,
        media: NewMedia,
        now_ms: i64,
    ) -> MediaResult<LocalMedia> {
        if media.project_id.is_none() && media.local_project_id.is_none() {
            return Err(MediaLibraryError::Other(
                "Media must belong to a project".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let (width, height) = match media.media_type {
            MediaType::Photo => image_dimensions(&media.blob).unzip(),
            MediaType::Video => (None, None),
        };
        let tags_json = serde_json::to_string(&media.tag_ids)
            .map_err(|e| MediaLibraryError::Other(format!("Tag encoding failed: {}", e)))?;

        conn.execute(
            "INSERT INTO media (id, project_id, local_project_id, media_type, caption, width, height,
                                mime_type, blob, thumbnail, blob_size, sync_status, pending_tag_ids, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'pending', ?12, ?13)",
            params![
                id,
                media.project_id,
                media.local_project_id,
                media.media_type.as_str(),
                media.caption,
                width,
                height,
                media.mime_type,
                media.blob,
                media.thumbnail,
                media.blob.len() as i64,
                tags_json,
                now_ms,
            ],
        )?;

        log::debug!(
            "Stored {} {} ({} bytes)",
            media.media_type.as_str(),
            id,
            media.blob.len()
        );

        self.get_media(conn, &id)?
            .ok_or_else(|| MediaLibraryError::NotFound(format!("media {}", id)))
    }

    pub fn get_media(&self, conn: &Connection, id: &str) -> MediaResult<Option<LocalMedia>> {
        let sql = format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], media_from_row)
            .optional()?)
    }

    /// All media attached to a server project, newest first
    pub fn list_by_project(
        &self,
        conn: &Connection,
        server_project_id: &str,
    ) -> MediaResult<Vec<LocalMedia>> {
        let sql = format!(
            "SELECT {} FROM media WHERE project_id = ?1 ORDER BY created_at DESC",
            MEDIA_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![server_project_id], media_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Media captured against a project that is not confirmed yet
    pub fn list_by_local_project(
        &self,
        conn: &Connection,
        local_project_id: &str,
    ) -> MediaResult<Vec<LocalMedia>> {
        let sql = format!(
            "SELECT {} FROM media WHERE local_project_id = ?1 ORDER BY created_at DESC",
            MEDIA_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![local_project_id], media_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Synced media whose tag associations still have to be applied
    pub fn list_with_pending_tags(&self, conn: &Connection) -> MediaResult<Vec<LocalMedia>> {
        let sql = format!(
            "SELECT {} FROM media
             WHERE sync_status = 'synced' AND server_id IS NOT NULL AND pending_tag_ids != '[]'
               AND deleted_at IS NULL",
            MEDIA_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], media_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_status(
        &self,
        conn: &Connection,
        id: &str,
        status: MediaSyncStatus,
    ) -> MediaResult<()> {
        let rows = conn.execute(
            "UPDATE media SET sync_status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if rows == 0 {
            return Err(MediaLibraryError::NotFound(format!("media {}", id)));
        }
        Ok(())
    }

    /// Records the server identity after a confirmed upload
    pub fn mark_synced(&self, conn: &Connection, id: &str, server_id: &str) -> MediaResult<()> {
        conn.execute(
            "UPDATE media SET sync_status = 'synced', server_id = ?1, error = NULL WHERE id = ?2",
            params![server_id, id],
        )?;
        Ok(())
    }

    /// Stores attempt bookkeeping after a failed upload
    pub fn record_failure(
        &self,
        conn: &Connection,
        id: &str,
        status: MediaSyncStatus,
        retry_count: u32,
        attempted_at: i64,
        error: &str,
    ) -> MediaResult<()> {
        conn.execute(
            "UPDATE media SET sync_status = ?1, retry_count = ?2, last_attempt = ?3, error = ?4
             WHERE id = ?5",
            params![status.as_str(), retry_count, attempted_at, error, id],
        )?;
        Ok(())
    }

    /// Resets a failed capture so it can be queued again from scratch
    pub fn reset_for_retry(&self, conn: &Connection, id: &str) -> MediaResult<()> {
        conn.execute(
            "UPDATE media SET sync_status = 'pending', retry_count = 0, error = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn update_caption(
        &self,
        conn: &Connection,
        id: &str,
        caption: Option<&str>,
    ) -> MediaResult<()> {
        conn.execute(
            "UPDATE media SET caption = ?1 WHERE id = ?2",
            params![caption, id],
        )?;
        Ok(())
    }

    pub fn set_pending_tags(&self, conn: &Connection, id: &str, tags: &[String]) -> MediaResult<()> {
        let tags_json = serde_json::to_string(tags)
            .map_err(|e| MediaLibraryError::Other(format!("Tag encoding failed: {}", e)))?;
        conn.execute(
            "UPDATE media SET pending_tag_ids = ?1 WHERE id = ?2",
            params![tags_json, id],
        )?;
        Ok(())
    }

    /// Points captures made against a local project at its confirmed server id
    pub fn attach_to_server_project(
        &self,
        conn: &Connection,
        local_project_id: &str,
        server_project_id: &str,
    ) -> MediaResult<usize> {
        let rows = conn.execute(
            "UPDATE media SET project_id = ?1 WHERE local_project_id = ?2 AND project_id IS NULL",
            params![server_project_id, local_project_id],
        )?;
        Ok(rows)
    }

    /// Ids of every capture of a project, whichever of its ids they carry
    pub fn list_ids_for_project(
        &self,
        conn: &Connection,
        local_project_id: &str,
        server_project_id: Option<&str>,
    ) -> MediaResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT id FROM media
             WHERE local_project_id = ?1 OR (?2 IS NOT NULL AND project_id = ?2)",
        )?;
        let ids = stmt
            .query_map(params![local_project_id, server_project_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Hides a capture until its remote delete is confirmed
    ///
    /// Attempt bookkeeping starts over so the delete gets its own budget.
    pub fn mark_deleted(&self, conn: &Connection, id: &str, now_ms: i64) -> MediaResult<()> {
        let rows = conn.execute(
            "UPDATE media SET deleted_at = ?1, sync_status = 'pending', retry_count = 0, error = NULL
             WHERE id = ?2",
            params![now_ms, id],
        )?;
        if rows == 0 {
            return Err(MediaLibraryError::NotFound(format!("media {}", id)));
        }
        Ok(())
    }

    pub fn set_annotation(
        &self,
        conn: &Connection,
        id: &str,
        annotation: &serde_json::Value,
    ) -> MediaResult<()> {
        let json = serde_json::to_string(annotation)
            .map_err(|e| MediaLibraryError::Other(format!("Annotation encoding failed: {}", e)))?;
        conn.execute(
            "UPDATE media SET annotation = ?1 WHERE id = ?2",
            params![json, id],
        )?;
        Ok(())
    }

    /// Drops the original payload once the remote copy is authoritative
    pub fn release_blob(&self, conn: &Connection, id: &str) -> MediaResult<()> {
        conn.execute(
            "UPDATE media SET blob = X'' WHERE id = ?1 AND sync_status = 'synced'",
            params![id],
        )?;
        Ok(())
    }

    pub fn delete_media(&self, conn: &Connection, id: &str) -> MediaResult<()> {
        conn.execute("DELETE FROM media WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Materializes the best available local image for display
    ///
    /// Prefers the thumbnail; falls back to the original blob. The returned
    /// handle owns the file and must be kept alive while it is shown.
    pub fn open_display_handle(&self, conn: &Connection, id: &str) -> MediaResult<DisplayHandle> {
        let media = self
            .get_media(conn, id)?
            .ok_or_else(|| MediaLibraryError::NotFound(format!("media {}", id)))?;

        let (data, suffix) = match &media.thumbnail {
            Some(thumb) => (thumb.as_slice(), "thumb.webp"),
            None if !media.blob.is_empty() => (media.blob.as_slice(), "original"),
            None => {
                return Err(MediaLibraryError::NotFound(format!(
                    "no local payload for media {}",
                    id
                )))
            }
        };

        let name = format!("{}_{}_{}", media.id, Uuid::new_v4().simple(), suffix);
        let handle =
            DisplayHandle::materialize(Path::new(&self.config.display_cache_dir), &name, data)?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::init_media_schema;
    use crate::thumbnail::test_jpeg;

    fn setup() -> (Connection, MediaLibraryService) {
        let conn = Connection::open_in_memory().unwrap();
        init_media_schema(&conn).unwrap();
        (conn, MediaLibraryService::new(MediaLibraryConfig::default()))
    }

    fn photo(project: &str) -> NewMedia {
        NewMedia {
            project_id: Some(project.to_string()),
            local_project_id: None,
            media_type: MediaType::Photo,
            caption: Some("North wall".to_string()),
            mime_type: "image/jpeg".to_string(),
            blob: test_jpeg(64, 48),
            thumbnail: None,
            tag_ids: vec!["t1".to_string()],
        }
    }

    #[test]
    fn test_insert_and_get() {
        let (conn, service) = setup();
        let media = service.insert_media(&conn, photo("p1"), 1_000).unwrap();

        assert_eq!(media.sync_status, MediaSyncStatus::Pending);
        assert_eq!(media.width, Some(64));
        assert_eq!(media.height, Some(48));
        assert_eq!(media.pending_tag_ids, vec!["t1".to_string()]);
        assert_eq!(media.blob_size, media.blob.len() as u64);

        let loaded = service.get_media(&conn, &media.id).unwrap().unwrap();
        assert_eq!(loaded, media);
    }

    #[test]
    fn test_requires_project() {
        let (conn, service) = setup();
        let mut orphan = photo("p1");
        orphan.project_id = None;
        assert!(service.insert_media(&conn, orphan, 1).is_err());
    }

    #[test]
    fn test_list_by_project_newest_first() {
        let (conn, service) = setup();
        let a = service.insert_media(&conn, photo("p1"), 1).unwrap();
        let b = service.insert_media(&conn, photo("p1"), 2).unwrap();
        service.insert_media(&conn, photo("p2"), 3).unwrap();

        let listed = service.list_by_project(&conn, "p1").unwrap();
        let ids: Vec<_> = listed.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn test_attach_to_server_project() {
        let (conn, service) = setup();
        let mut pending = photo("unused");
        pending.project_id = None;
        pending.local_project_id = Some("local-1".to_string());
        let media = service.insert_media(&conn, pending, 1).unwrap();

        let attached = service
            .attach_to_server_project(&conn, "local-1", "srv-9")
            .unwrap();
        assert_eq!(attached, 1);

        let loaded = service.get_media(&conn, &media.id).unwrap().unwrap();
        assert_eq!(loaded.project_id.as_deref(), Some("srv-9"));
    }

    #[test]
    fn test_release_blob_only_after_sync() {
        let (conn, service) = setup();
        let media = service.insert_media(&conn, photo("p1"), 1).unwrap();

        service.release_blob(&conn, &media.id).unwrap();
        let still_pending = service.get_media(&conn, &media.id).unwrap().unwrap();
        assert!(!still_pending.blob.is_empty());

        service.mark_synced(&conn, &media.id, "srv-1").unwrap();
        service.release_blob(&conn, &media.id).unwrap();
        let synced = service.get_media(&conn, &media.id).unwrap().unwrap();
        assert!(synced.blob.is_empty());
        assert_eq!(synced.server_id.as_deref(), Some("srv-1"));
    }

    #[test]
    fn test_pending_tags_listing() {
        let (conn, service) = setup();
        let media = service.insert_media(&conn, photo("p1"), 1).unwrap();
        assert!(service.list_with_pending_tags(&conn).unwrap().is_empty());

        service.mark_synced(&conn, &media.id, "srv-1").unwrap();
        assert_eq!(service.list_with_pending_tags(&conn).unwrap().len(), 1);

        service.set_pending_tags(&conn, &media.id, &[]).unwrap();
        assert!(service.list_with_pending_tags(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_deleted_media_leaves_tag_listing() {
        let (conn, service) = setup();
        let media = service.insert_media(&conn, photo("p1"), 1).unwrap();
        service.mark_synced(&conn, &media.id, "srv-1").unwrap();
        service
            .record_failure(&conn, &media.id, MediaSyncStatus::Error, 2, 5, "caption rejected")
            .unwrap();

        service.mark_deleted(&conn, &media.id, 9).unwrap();
        let deleted = service.get_media(&conn, &media.id).unwrap().unwrap();
        assert_eq!(deleted.deleted_at, Some(9));
        assert_eq!(deleted.sync_status, MediaSyncStatus::Pending);
        assert_eq!(deleted.retry_count, 0);
        assert!(deleted.error.is_none());
        assert!(deleted.is_pending_delete());
        assert!(service.list_with_pending_tags(&conn).unwrap().is_empty());

        assert!(matches!(
            service.mark_deleted(&conn, "missing", 9),
            Err(MediaLibraryError::NotFound(_))
        ));
    }

    #[test]
    fn test_annotation_is_kept_as_json() {
        let (conn, service) = setup();
        let media = service.insert_media(&conn, photo("p1"), 1).unwrap();
        assert!(media.annotation.is_none());

        let doc = serde_json::json!({ "shapes": [{ "kind": "arrow" }] });
        service.set_annotation(&conn, &media.id, &doc).unwrap();
        let loaded = service.get_media(&conn, &media.id).unwrap().unwrap();
        assert_eq!(loaded.annotation, Some(doc));

        service
            .set_annotation(&conn, &media.id, &serde_json::Value::Null)
            .unwrap();
        let loaded = service.get_media(&conn, &media.id).unwrap().unwrap();
        assert_eq!(loaded.annotation, Some(serde_json::Value::Null));
    }

    #[test]
    fn test_ids_for_project_cover_both_ids() {
        let (conn, service) = setup();
        let attached = service.insert_media(&conn, photo("srv-p"), 1).unwrap();
        let mut early = photo("unused");
        early.project_id = None;
        early.local_project_id = Some("local-p".to_string());
        let early = service.insert_media(&conn, early, 2).unwrap();
        service.insert_media(&conn, photo("other"), 3).unwrap();

        let mut ids = service
            .list_ids_for_project(&conn, "local-p", Some("srv-p"))
            .unwrap();
        ids.sort();
        let mut expected = vec![attached.id, early.id.clone()];
        expected.sort();
        assert_eq!(ids, expected);

        let local_only = service.list_ids_for_project(&conn, "local-p", None).unwrap();
        assert_eq!(local_only, vec![early.id]);
    }

    #[test]
    fn test_display_handle_uses_blob() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        init_media_schema(&conn).unwrap();
        let service = MediaLibraryService::new(MediaLibraryConfig {
            display_cache_dir: dir.path().to_string_lossy().to_string(),
            thumbnail_size: 128,
        });

        let media = service.insert_media(&conn, photo("p1"), 1).unwrap();
        let handle = service.open_display_handle(&conn, &media.id).unwrap();
        assert_eq!(std::fs::read(handle.path()).unwrap(), media.blob);
    }
}
