//! # Sync Manager
//!
//! Drains the sync queue against the remote. One cycle:
//!
//! 1. single-flight guard
//! 2. connectivity and upload-policy precheck (policy fetch fails open)
//! 3. best-effort pass over photos whose tags are still pending
//! 4. per item type (projects, then photos, then annotations), newest first,
//!    in batches of `batch_size` that settle completely before the next
//!    batch starts
//! 5. one `sync-complete` or `sync-error` event at the end
//!
//! `sync_now` never returns an error; everything ends up in [`SyncResult`].

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::database::LocalStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    LocalMedia, LocalProject, MediaSyncStatus, NewSyncItem, ProjectSyncStatus, SyncAction,
    SyncItemType, SyncQueueItem, SyncQueuePatch,
};
use crate::network::{NetworkMonitor, UploadPolicy};
use crate::remote::{ProjectPayload, RemoteApi};
use crate::services::backoff::Backoff;
use crate::services::sync_events::{ItemError, SyncEvent, SyncProgress, SyncResult};
use crate::transport::{TransportSelector, TransportSettings};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

const EVENT_CAPACITY: usize = 64;
pub const ALREADY_RUNNING: &str = "sync already in progress";

/// Resets the in-progress flag when a cycle ends, however it ends
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What happened to one queue item in this cycle
#[derive(Debug)]
enum ItemOutcome {
    Synced,
    /// Still inside its backoff window
    Skipped,
    /// Waiting on another entity (e.g. its project) to be confirmed
    Deferred,
    /// The local entity no longer exists; the item was removed
    Dropped,
    Failed(ItemError),
}

enum Dispatch {
    Done,
    Deferred(String),
    Obsolete,
}

pub struct SyncManager<R, C = SystemClock> {
    store: Arc<LocalStore>,
    remote: Arc<R>,
    network: NetworkMonitor,
    clock: C,
    config: SyncConfig,
    backoff: Backoff,
    transport: TransportSettings,
    events: broadcast::Sender<SyncEvent>,
    in_progress: AtomicBool,
    trigger: Notify,
}

impl<R: RemoteApi, C: Clock> SyncManager<R, C> {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<R>,
        network: NetworkMonitor,
        clock: C,
        config: SyncConfig,
        thumbnail_size: u32,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            remote,
            network,
            clock,
            backoff: Backoff::new(config.initial_delay_ms, config.max_delay_ms),
            transport: TransportSettings::from_sync_config(&config, thumbnail_size),
            config,
            events,
            in_progress: AtomicBool::new(false),
            trigger: Notify::new(),
        }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// New event stream; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Asks the background driver for a cycle; repeated requests coalesce
    pub fn request_sync(&self) {
        self.trigger.notify_one();
    }

    pub(crate) async fn sync_requested(&self) {
        self.trigger.notified().await;
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Runs one sync cycle
    pub async fn sync_now(&self) -> SyncResult {
        let Some(_guard) = FlightGuard::acquire(&self.in_progress) else {
            log::debug!("Sync requested while a cycle is running");
            return SyncResult::rejected(ALREADY_RUNNING);
        };

        let connectivity = self.network.current();
        if !connectivity.is_online() {
            log::info!("Sync deferred: offline");
            return SyncResult::deferred("offline");
        }

        let policy = match self.remote.fetch_upload_policy().await {
            Ok(policy) => policy,
            Err(e) => {
                log::warn!("Upload policy unavailable, allowing upload: {}", e);
                UploadPolicy::default()
            }
        };
        if let Some(reason) = policy.deferral_reason(connectivity) {
            log::info!("Sync deferred: {}", reason);
            return SyncResult::deferred(reason);
        }

        if let Err(e) = self.retry_pending_tags().await {
            log::warn!("Tag retry pass failed: {}", e);
            self.emit(SyncEvent::ItemError {
                error: ItemError {
                    item_id: "tag-pass".to_string(),
                    item_type: "tags".to_string(),
                    local_id: String::new(),
                    message: e.to_string(),
                    retry_count: 0,
                    permanent: false,
                    requires_reauth: e.is_auth(),
                },
            });
        }

        let result = match self.store.get_pending_sync_items().await {
            Ok(items) => self.drain(items).await,
            Err(e) => {
                log::error!("Could not read sync queue: {}", e);
                SyncResult {
                    success: false,
                    failed: 0,
                    errors: vec![e.to_string()],
                    ..Default::default()
                }
            }
        };

        log::info!(
            "Sync cycle finished: {} synced, {} failed, {} skipped{}",
            result.synced,
            result.failed,
            result.skipped,
            if result.requires_reauth {
                " (re-authentication required)"
            } else {
                ""
            }
        );

        if !result.success {
            let error = result
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| "sync failed".to_string());
            self.emit(SyncEvent::SyncError {
                result: result.clone(),
                error,
            });
        } else if result.synced > 0 {
            self.emit(SyncEvent::SyncComplete {
                result: result.clone(),
            });
        }

        result
    }

    /// Processes partitions in dispatch order, batch by batch
    async fn drain(&self, items: Vec<SyncQueueItem>) -> SyncResult {
        let mut result = SyncResult::default();
        let mut progress = SyncProgress {
            total: items.len(),
            ..Default::default()
        };
        log::info!("Sync cycle started with {} queued items", items.len());

        let batch_size = self.config.batch_size.max(1);
        'partitions: for item_type in SyncItemType::DISPATCH_ORDER {
            let mut partition: Vec<&SyncQueueItem> =
                items.iter().filter(|i| i.item_type == item_type).collect();
            partition.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

            for batch in partition.chunks(batch_size) {
                progress.batch_index += 1;
                self.emit(SyncEvent::SyncProgress {
                    progress: progress.clone(),
                });

                let outcomes = join_all(batch.iter().map(|item| self.process_item(item))).await;

                for outcome in outcomes {
                    progress.processed += 1;
                    match outcome {
                        ItemOutcome::Synced => {
                            progress.synced += 1;
                            result.synced += 1;
                        }
                        ItemOutcome::Skipped | ItemOutcome::Deferred => {
                            progress.skipped += 1;
                            result.skipped += 1;
                        }
                        ItemOutcome::Dropped => progress.dropped += 1,
                        ItemOutcome::Failed(error) => {
                            progress.failed += 1;
                            result.failed += 1;
                            result.requires_reauth |= error.requires_reauth;
                            result.errors.push(format!(
                                "{} {}: {}",
                                error.item_type, error.local_id, error.message
                            ));
                            self.emit(SyncEvent::ItemError { error });
                        }
                    }
                }

                self.emit(SyncEvent::SyncProgress {
                    progress: progress.clone(),
                });

                if result.requires_reauth {
                    log::warn!("Authorization lost, skipping the rest of this cycle");
                    break 'partitions;
                }
            }
        }

        result.success = result.failed == 0 && !result.requires_reauth;
        result
    }

    async fn process_item(&self, item: &SyncQueueItem) -> ItemOutcome {
        match self.try_process_item(item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // bookkeeping itself failed; report, leave the item as it is
                log::error!("Could not process queue item {}: {}", item.id, e);
                ItemOutcome::Failed(item_error(item, e.to_string(), item.retry_count, false, false))
            }
        }
    }

    async fn try_process_item(&self, item: &SyncQueueItem) -> AppResult<ItemOutcome> {
        let max_retry = self.config.max_retry_count;

        if item.retry_count >= max_retry {
            self.store.remove_from_sync_queue(&item.id).await?;
            let message = item
                .error
                .clone()
                .unwrap_or_else(|| "retry budget exhausted".to_string());
            self.mark_entity_failed(item, &message).await?;
            log::error!(
                "Giving up on {} {} {} after {} attempts: {}",
                item.action.as_str(),
                item.item_type.as_str(),
                item.local_id,
                item.retry_count,
                message
            );
            return Ok(ItemOutcome::Failed(item_error(
                item,
                message,
                item.retry_count,
                true,
                false,
            )));
        }

        let now = self.clock.now_ms();
        if !self
            .backoff
            .window_elapsed(item.retry_count, item.last_attempt, now)
        {
            log::debug!(
                "Queue item {} waiting out its backoff (retry {})",
                item.id,
                item.retry_count
            );
            return Ok(ItemOutcome::Skipped);
        }

        match self.dispatch(item, now).await {
            Ok(Dispatch::Done) => {
                self.store.remove_from_sync_queue(&item.id).await?;
                log::debug!(
                    "Synced {} {} {}",
                    item.action.as_str(),
                    item.item_type.as_str(),
                    item.local_id
                );
                Ok(ItemOutcome::Synced)
            }
            Ok(Dispatch::Deferred(reason)) => {
                log::debug!("Queue item {} deferred: {}", item.id, reason);
                Ok(ItemOutcome::Deferred)
            }
            Ok(Dispatch::Obsolete) => {
                self.store.remove_from_sync_queue(&item.id).await?;
                log::info!(
                    "Dropped {} {} {}: local entity is gone",
                    item.action.as_str(),
                    item.item_type.as_str(),
                    item.local_id
                );
                Ok(ItemOutcome::Dropped)
            }
            Err(e) if e.is_auth() => {
                let message = e.to_string();
                self.store
                    .update_sync_queue_item(
                        &item.id,
                        SyncQueuePatch {
                            last_attempt: Some(now),
                            error: Some(message.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.mark_entity_retrying(item, item.retry_count, now, &message)
                    .await?;
                log::warn!(
                    "{} {} needs re-authentication: {}",
                    item.item_type.as_str(),
                    item.local_id,
                    message
                );
                Ok(ItemOutcome::Failed(item_error(
                    item,
                    message,
                    item.retry_count,
                    false,
                    true,
                )))
            }
            Err(e) => {
                let message = e.to_string();
                let retry_count = (item.retry_count + 1).min(max_retry);
                self.store
                    .update_sync_queue_item(
                        &item.id,
                        SyncQueuePatch {
                            retry_count: Some(retry_count),
                            last_attempt: Some(now),
                            error: Some(message.clone()),
                            data: None,
                        },
                    )
                    .await?;
                self.mark_entity_retrying(item, retry_count, now, &message)
                    .await?;
                log::warn!(
                    "{} {} {} failed (attempt {}): {}",
                    item.action.as_str(),
                    item.item_type.as_str(),
                    item.local_id,
                    retry_count,
                    message
                );
                Ok(ItemOutcome::Failed(item_error(
                    item,
                    message,
                    retry_count,
                    false,
                    false,
                )))
            }
        }
    }

    async fn dispatch(&self, item: &SyncQueueItem, now: i64) -> AppResult<Dispatch> {
        match item.item_type {
            SyncItemType::Project => self.sync_project(item, now).await,
            SyncItemType::Photo => self.sync_photo(item, now).await,
            SyncItemType::Annotation => self.sync_annotation(item).await,
        }
    }

    async fn sync_project(&self, item: &SyncQueueItem, now: i64) -> AppResult<Dispatch> {
        if item.action == SyncAction::Delete {
            let Some(server_id) = server_id_of(item) else {
                return Ok(Dispatch::Obsolete);
            };
            let done = ignore_missing(self.remote.delete_project(&server_id).await)?;
            self.store.delete_project(&item.local_id).await?;
            log::info!("Project {} deleted on the server", item.local_id);
            return Ok(done);
        }

        let Some(project) = self.store.get_project(&item.local_id).await? else {
            return Ok(Dispatch::Obsolete);
        };
        let payload = ProjectPayload {
            name: project.name.clone(),
            description: project.description.clone(),
        };

        match (item.action, project.server_id.as_deref()) {
            (SyncAction::Create, Some(_)) => Ok(Dispatch::Done),
            (SyncAction::Create, None) => {
                let created = self.remote.create_project(&payload).await?;
                self.store
                    .mark_project_synced(&project.id, &created.id, now)
                    .await?;
                log::info!("Project {} confirmed as {}", project.id, created.id);
                Ok(Dispatch::Done)
            }
            (_, None) => Ok(Dispatch::Deferred("project not confirmed yet".to_string())),
            (_, Some(server_id)) => {
                self.remote.update_project(server_id, &payload).await?;
                self.store
                    .set_project_status(&project.id, ProjectSyncStatus::Synced)
                    .await?;
                Ok(Dispatch::Done)
            }
        }
    }

    async fn sync_photo(&self, item: &SyncQueueItem, now: i64) -> AppResult<Dispatch> {
        if item.action == SyncAction::Delete {
            let Some(server_id) = server_id_of(item) else {
                return Ok(Dispatch::Obsolete);
            };
            let done = ignore_missing(self.remote.delete_media(&server_id).await)?;
            self.store.delete_media(&item.local_id).await?;
            return Ok(done);
        }

        let Some(media) = self.store.get_photo(&item.local_id).await? else {
            return Ok(Dispatch::Obsolete);
        };

        match item.action {
            SyncAction::Create => self.upload_media(&media, now).await,
            _ => {
                let Some(server_id) = media.server_id.as_deref() else {
                    return Ok(Dispatch::Deferred("photo not uploaded yet".to_string()));
                };
                let patch = serde_json::json!({ "caption": media.caption });
                self.remote.update_media(server_id, &patch).await?;
                self.store.mark_media_synced(&media.id, server_id).await?;
                Ok(Dispatch::Done)
            }
        }
    }

    async fn upload_media(&self, media: &LocalMedia, now: i64) -> AppResult<Dispatch> {
        if media.server_id.is_some() && media.sync_status == MediaSyncStatus::Synced {
            return Ok(Dispatch::Done);
        }

        let Some(project_id) = self.resolve_server_project(media).await? else {
            return Ok(Dispatch::Deferred("project not confirmed yet".to_string()));
        };

        self.store
            .update_media_status(&media.id, MediaSyncStatus::Syncing)
            .await?;
        let selector = TransportSelector::new(self.remote.as_ref(), &self.store, self.transport);
        let created = selector.upload(media, &project_id, now).await?;

        self.store.mark_media_synced(&media.id, &created.id).await?;
        self.store.release_media_blob(&media.id).await?;

        if !media.pending_tag_ids.is_empty() {
            match self
                .remote
                .add_photo_tags(&created.id, &media.pending_tag_ids)
                .await
            {
                Ok(()) => self.store.set_pending_tags(&media.id, &[]).await?,
                Err(e) => log::warn!("Tags for {} stay pending: {}", media.id, e),
            }
        }
        Ok(Dispatch::Done)
    }

    /// Server project id of a capture, following a local project once confirmed
    async fn resolve_server_project(&self, media: &LocalMedia) -> AppResult<Option<String>> {
        if let Some(project_id) = &media.project_id {
            return Ok(Some(project_id.clone()));
        }
        let Some(local_project_id) = &media.local_project_id else {
            return Err(AppError::Validation(format!(
                "media {} has no project",
                media.id
            )));
        };
        match self.store.get_project(local_project_id).await? {
            Some(LocalProject {
                server_id: Some(server_id),
                ..
            }) => {
                // captured while the confirmation was being written
                self.store
                    .attach_media_to_server_project(local_project_id, &server_id)
                    .await?;
                Ok(Some(server_id))
            }
            Some(_) => Ok(None),
            None => Err(AppError::Validation(format!(
                "project {} of media {} no longer exists",
                local_project_id, media.id
            ))),
        }
    }

    async fn sync_annotation(&self, item: &SyncQueueItem) -> AppResult<Dispatch> {
        let Some(media) = self.store.get_photo(&item.local_id).await? else {
            return Ok(Dispatch::Obsolete);
        };
        let Some(photo_id) = media.server_id.as_deref() else {
            return Ok(Dispatch::Deferred("photo not uploaded yet".to_string()));
        };

        let done = match item.action {
            SyncAction::Delete => ignore_missing(self.remote.delete_annotation(photo_id).await)?,
            _ => {
                self.remote.put_annotation(photo_id, &item.data).await?;
                Dispatch::Done
            }
        };
        if media.sync_status == MediaSyncStatus::Error {
            self.store.mark_media_synced(&media.id, photo_id).await?;
        }
        Ok(done)
    }

    /// Mirrors a failed attempt onto the owning entity
    async fn mark_entity_retrying(
        &self,
        item: &SyncQueueItem,
        retry_count: u32,
        now: i64,
        message: &str,
    ) -> AppResult<()> {
        if item.item_type == SyncItemType::Photo && item.action == SyncAction::Create {
            self.store
                .record_media_failure(
                    &item.local_id,
                    MediaSyncStatus::Pending,
                    retry_count,
                    now,
                    message,
                )
                .await?;
        }
        Ok(())
    }

    /// Leaves the owning entity in `error` once its queue item is given up on
    ///
    /// Annotations fail on the photo they belong to. Deletes fail on the
    /// hidden row, which shows up again in `error`.
    async fn mark_entity_failed(&self, item: &SyncQueueItem, message: &str) -> AppResult<()> {
        match item.item_type {
            SyncItemType::Project => {
                if self.store.get_project(&item.local_id).await?.is_some() {
                    self.store
                        .set_project_status(&item.local_id, ProjectSyncStatus::Error)
                        .await?;
                }
            }
            SyncItemType::Photo | SyncItemType::Annotation => {
                if self.store.get_photo(&item.local_id).await?.is_some() {
                    self.store
                        .record_media_failure(
                            &item.local_id,
                            MediaSyncStatus::Error,
                            item.retry_count,
                            item.last_attempt.unwrap_or_else(|| self.clock.now_ms()),
                            message,
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Applies tag associations of already uploaded photos
    async fn retry_pending_tags(&self) -> AppResult<()> {
        let pending = self.store.media_with_pending_tags().await?;
        if pending.is_empty() {
            return Ok(());
        }
        log::debug!("Retrying tags of {} photos", pending.len());

        for media in pending {
            let Some(server_id) = media.server_id.as_deref() else {
                continue;
            };
            match self
                .remote
                .add_photo_tags(server_id, &media.pending_tag_ids)
                .await
            {
                Ok(()) => self.store.set_pending_tags(&media.id, &[]).await?,
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => log::warn!("Tags for {} still pending: {}", media.id, e),
            }
        }
        Ok(())
    }

    /// Puts whatever failed for a capture back in the queue with a fresh budget
    ///
    /// An upload that never went through is queued again. For an uploaded
    /// capture, the caption and the local annotation are sent again. A failed
    /// delete is queued again.
    pub async fn retry_failed_media(&self, media_id: &str) -> AppResult<()> {
        let media = self
            .store
            .get_photo(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media {}", media_id)))?;
        let project_id = media.project_id.clone().or(media.local_project_id.clone());

        let items = match (media.server_id.as_deref(), media.deleted_at) {
            (None, None) if media.sync_status != MediaSyncStatus::Synced => {
                vec![NewSyncItem::new(SyncItemType::Photo, media_id, SyncAction::Create)
                    .with_project(project_id)]
            }
            (Some(server_id), Some(_)) if media.sync_status == MediaSyncStatus::Error => {
                vec![NewSyncItem::new(SyncItemType::Photo, media_id, SyncAction::Delete)
                    .with_project(project_id)
                    .with_data(serde_json::json!({ "serverId": server_id }))]
            }
            (Some(_), None) if media.sync_status == MediaSyncStatus::Error => {
                let mut items = vec![NewSyncItem::new(
                    SyncItemType::Photo,
                    media_id,
                    SyncAction::Update,
                )
                .with_project(project_id.clone())];
                match media.annotation.clone() {
                    Some(serde_json::Value::Null) => items.push(
                        NewSyncItem::new(SyncItemType::Annotation, media_id, SyncAction::Delete)
                            .with_project(project_id),
                    ),
                    Some(annotation) => items.push(
                        NewSyncItem::new(SyncItemType::Annotation, media_id, SyncAction::Update)
                            .with_project(project_id)
                            .with_data(annotation),
                    ),
                    None => {}
                }
                items
            }
            _ => {
                return Err(AppError::Validation(format!(
                    "media {} has nothing to retry",
                    media_id
                )))
            }
        };

        let now = self.clock.now_ms();
        self.store.reset_media_for_retry(media_id).await?;
        for item in items {
            self.store.remove_from_sync_queue(&item.id()).await?;
            if let Err(e) = self.store.add_to_sync_queue(item, now).await {
                self.store
                    .record_media_failure(media_id, MediaSyncStatus::Error, 0, now, &e.to_string())
                    .await?;
                return Err(e);
            }
        }
        log::info!("Media {} queued for manual retry", media_id);

        self.request_sync();
        Ok(())
    }

    /// Same as [`Self::retry_failed_media`] for a project
    pub async fn retry_failed_project(&self, project_id: &str) -> AppResult<()> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project {}", project_id)))?;

        let item = match (project.server_id.as_deref(), project.deleted_at) {
            (None, _) => NewSyncItem::new(SyncItemType::Project, project_id, SyncAction::Create),
            (Some(server_id), Some(_)) => {
                NewSyncItem::new(SyncItemType::Project, project_id, SyncAction::Delete)
                    .with_data(serde_json::json!({ "serverId": server_id }))
            }
            (Some(_), None) if project.sync_status == ProjectSyncStatus::Error => {
                NewSyncItem::new(SyncItemType::Project, project_id, SyncAction::Update)
            }
            (Some(_), None) => {
                return Err(AppError::Validation(format!(
                    "project {} is already confirmed",
                    project_id
                )))
            }
        };

        let now = self.clock.now_ms();
        self.store.remove_from_sync_queue(&item.id()).await?;
        self.store
            .set_project_status(project_id, ProjectSyncStatus::Pending)
            .await?;
        if let Err(e) = self.store.add_to_sync_queue(item, now).await {
            self.store
                .set_project_status(project_id, ProjectSyncStatus::Error)
                .await?;
            return Err(e);
        }
        log::info!("Project {} queued for manual retry", project_id);

        self.request_sync();
        Ok(())
    }
}

fn item_error(
    item: &SyncQueueItem,
    message: String,
    retry_count: u32,
    permanent: bool,
    requires_reauth: bool,
) -> ItemError {
    ItemError {
        item_id: item.id.clone(),
        item_type: item.item_type.as_str().to_string(),
        local_id: item.local_id.clone(),
        message,
        retry_count,
        permanent,
        requires_reauth,
    }
}

/// Server id captured when a delete was queued
fn server_id_of(item: &SyncQueueItem) -> Option<String> {
    item.data
        .get("serverId")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// A delete of something the server no longer has is done
fn ignore_missing(result: AppResult<()>) -> AppResult<Dispatch> {
    match result {
        Ok(()) | Err(AppError::NotFound(_)) => Ok(Dispatch::Done),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let first = FlightGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(FlightGuard::acquire(&flag).is_none());
        drop(first);
        assert!(FlightGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_server_id_of_delete_payload() {
        let item = SyncQueueItem {
            id: "q".into(),
            item_type: SyncItemType::Photo,
            local_id: "m".into(),
            project_id: None,
            action: SyncAction::Delete,
            data: serde_json::json!({ "serverId": "srv-9" }),
            retry_count: 0,
            last_attempt: None,
            created_at: 0,
            error: None,
        };
        assert_eq!(server_id_of(&item).as_deref(), Some("srv-9"));
    }

    #[test]
    fn test_missing_remote_counts_as_deleted() {
        assert!(matches!(
            ignore_missing(Err(AppError::NotFound("gone".into()))),
            Ok(Dispatch::Done)
        ));
        assert!(ignore_missing(Err(AppError::Network("reset".into()))).is_err());
    }
}
