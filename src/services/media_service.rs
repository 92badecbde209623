//! User actions on captured photos and videos
//!
//! Every action writes to the store first, then queues the matching
//! mutation, then nudges the sync driver.

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{
    LocalMedia, MediaType, NewMedia, NewSyncItem, RemoteMedia, SyncAction, SyncItemType,
    SyncQueuePatch,
};
use crate::remote::RemoteApi;
use crate::services::merge_service::{local_entries, merge_for_display, DisplayEntry};
use crate::services::project_service;
use crate::services::sync_manager::SyncManager;
use std::collections::HashSet;

/// A fresh capture from the camera
#[derive(Debug, Clone)]
pub struct Capture {
    /// Local project id; the project does not have to be confirmed yet
    pub project_id: String,
    pub media_type: MediaType,
    pub mime_type: String,
    pub blob: Vec<u8>,
    /// Frame extracted by the recorder, for videos
    pub thumbnail: Option<Vec<u8>>,
    pub caption: Option<String>,
    pub tag_ids: Vec<String>,
}

/// Stores a capture and queues its upload
pub async fn capture_media<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    capture: Capture,
) -> AppResult<LocalMedia> {
    if capture.blob.is_empty() {
        return Err(AppError::Validation("Capture is empty".to_string()));
    }

    let store = sync.store();
    let project = project_service::get_project(sync, &capture.project_id).await?;

    let (project_id, local_project_id) = match project.server_id {
        Some(server_id) => (Some(server_id), None),
        None => (None, Some(project.id.clone())),
    };
    let now = sync.clock().now_ms();
    let media = store
        .insert_media(
            NewMedia {
                project_id: project_id.clone(),
                local_project_id,
                media_type: capture.media_type,
                caption: capture.caption,
                mime_type: capture.mime_type,
                blob: capture.blob,
                thumbnail: capture.thumbnail,
                tag_ids: capture.tag_ids,
            },
            now,
        )
        .await?;

    let item = NewSyncItem::new(SyncItemType::Photo, &media.id, SyncAction::Create)
        .with_project(project_id.or(Some(project.id)));
    if let Err(e) = store.add_to_sync_queue(item, now).await {
        store.delete_media(&media.id).await?;
        log::warn!("Capture refused: {}", e);
        return Err(e);
    }

    log::info!(
        "Captured {} {} ({} bytes)",
        media.media_type.as_str(),
        media.id,
        media.blob_size
    );
    sync.request_sync();
    Ok(media)
}

pub async fn update_caption<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    media_id: &str,
    caption: Option<&str>,
) -> AppResult<()> {
    let store = sync.store();
    let media = get_media(sync, media_id).await?;
    store.update_media_caption(media_id, caption).await?;

    // not uploaded yet: the upload carries the new caption
    if media.server_id.is_some() {
        let item = NewSyncItem::new(SyncItemType::Photo, media_id, SyncAction::Update)
            .with_project(media.project_id);
        store.add_to_sync_queue(item, sync.clock().now_ms()).await?;
        sync.request_sync();
    }
    Ok(())
}

/// Deletes a capture; an uploaded one stays hidden until the server confirms
pub async fn delete_media<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    media_id: &str,
) -> AppResult<()> {
    let media = get_media(sync, media_id).await?;

    let remote_delete = media.server_id.as_ref().map(|server_id| {
        NewSyncItem::new(SyncItemType::Photo, media_id, SyncAction::Delete)
            .with_project(media.project_id.clone())
            .with_data(serde_json::json!({ "serverId": server_id }))
    });
    let queued = remote_delete.is_some();
    sync.store()
        .withdraw_media(media_id, remote_delete, sync.clock().now_ms())
        .await?;

    if queued {
        sync.request_sync();
    }
    Ok(())
}

/// Adds tag associations; they are applied after the upload, independent of the queue
pub async fn add_tags<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    media_id: &str,
    tag_ids: &[String],
) -> AppResult<()> {
    let media = get_media(sync, media_id).await?;
    let mut pending = media.pending_tag_ids;
    for tag in tag_ids {
        if !pending.contains(tag) {
            pending.push(tag.clone());
        }
    }
    sync.store().set_pending_tags(media_id, &pending).await?;
    sync.request_sync();
    Ok(())
}

/// Queues the current annotation document of a photo
///
/// Saving again before a sync replaces the queued document.
pub async fn save_annotation<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    media_id: &str,
    annotation: serde_json::Value,
) -> AppResult<()> {
    let store = sync.store();
    let media = get_media(sync, media_id).await?;
    store.set_media_annotation(media_id, &annotation).await?;

    let delete = NewSyncItem::new(SyncItemType::Annotation, media_id, SyncAction::Delete);
    store.remove_from_sync_queue(&delete.id()).await?;

    let item = NewSyncItem::new(SyncItemType::Annotation, media_id, SyncAction::Update)
        .with_project(media.project_id)
        .with_data(annotation.clone());
    let queued = store.add_to_sync_queue(item, sync.clock().now_ms()).await?;
    if queued.data != annotation {
        store
            .update_sync_queue_item(
                &queued.id,
                SyncQueuePatch {
                    data: Some(annotation),
                    ..Default::default()
                },
            )
            .await?;
    }
    sync.request_sync();
    Ok(())
}

pub async fn delete_annotation<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    media_id: &str,
) -> AppResult<()> {
    let store = sync.store();
    let media = get_media(sync, media_id).await?;
    store
        .set_media_annotation(media_id, &serde_json::Value::Null)
        .await?;
    store
        .remove_sync_items_for(SyncItemType::Annotation, media_id)
        .await?;

    // a photo the server never saw has no annotation there either
    if media.server_id.is_some() {
        let item = NewSyncItem::new(SyncItemType::Annotation, media_id, SyncAction::Delete)
            .with_project(media.project_id);
        store.add_to_sync_queue(item, sync.clock().now_ms()).await?;
        sync.request_sync();
    }
    Ok(())
}

pub async fn retry_failed_media<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    media_id: &str,
) -> AppResult<()> {
    sync.retry_failed_media(media_id).await
}

/// Media of a project for display: the server's list plus captures not confirmed yet
pub async fn list_project_media_for_display<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    project_id: &str,
) -> AppResult<Vec<DisplayEntry<RemoteMedia, LocalMedia>>> {
    let store = sync.store();
    let project = project_service::get_project(sync, project_id).await?;

    let mut local = store.get_local_project_photos(project_id).await?;
    let Some(server_id) = project.server_id else {
        return Ok(local_entries(local));
    };
    local.extend(store.get_project_photos(&server_id).await?);
    // captures made before confirmation carry both ids
    let mut seen = HashSet::new();
    local.retain(|m| seen.insert(m.id.clone()));

    if !sync.network().current().is_online() {
        return Ok(local_entries(local));
    }
    match sync.remote().list_project_media(&server_id).await {
        Ok(remote) => Ok(merge_for_display(remote, local)),
        Err(e) => {
            log::warn!("Could not load remote media of {}: {}", server_id, e);
            Ok(local_entries(local))
        }
    }
}

async fn get_media<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    media_id: &str,
) -> AppResult<LocalMedia> {
    sync.store()
        .get_photo(media_id)
        .await?
        .filter(|m| m.deleted_at.is_none())
        .ok_or_else(|| AppError::NotFound(format!("media {}", media_id)))
}
