use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{LocalProject, NewSyncItem, RemoteProject, SyncAction, SyncItemType};
use crate::remote::RemoteApi;
use crate::services::merge_service::{local_entries, merge_for_display, DisplayEntry};
use crate::services::sync_manager::SyncManager;

/// Creates a project locally and queues its creation on the server
pub async fn create_project<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    name: &str,
    description: Option<&str>,
) -> AppResult<LocalProject> {
    let store = sync.store();
    let now = sync.clock().now_ms();
    let project = LocalProject::new(
        name.trim().to_string(),
        description.map(str::to_string),
        now,
    );
    project.validate()?;
    store.insert_project(&project).await?;

    let item = NewSyncItem::new(SyncItemType::Project, &project.id, SyncAction::Create);
    if let Err(e) = store.add_to_sync_queue(item, now).await {
        // nothing is kept locally that the queue refused
        store.delete_project(&project.id).await?;
        return Err(e);
    }

    log::info!("Created project {} ({})", project.id, project.name);
    sync.request_sync();
    Ok(project)
}

pub async fn rename_project<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    project_id: &str,
    name: &str,
    description: Option<&str>,
) -> AppResult<LocalProject> {
    let store = sync.store();
    let mut project = get_project(sync, project_id).await?;
    project.name = name.trim().to_string();
    project.description = description.map(str::to_string);
    project.validate()?;

    let now = sync.clock().now_ms();
    store
        .update_project_fields(project_id, &project.name, description, now)
        .await?;
    project.updated_at = now;

    // an unconfirmed project is created with its latest fields anyway
    if project.server_id.is_some() {
        let item = NewSyncItem::new(SyncItemType::Project, project_id, SyncAction::Update);
        store.add_to_sync_queue(item, now).await?;
        sync.request_sync();
    }
    Ok(project)
}

/// Deletes a project with all of its captures
///
/// A confirmed project stays in the store, hidden, until the server confirms
/// the delete. If the queue is full nothing is deleted.
pub async fn delete_project<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    project_id: &str,
) -> AppResult<()> {
    let store = sync.store();
    let project = get_project(sync, project_id).await?;

    let remote_delete = project.server_id.as_ref().map(|server_id| {
        NewSyncItem::new(SyncItemType::Project, project_id, SyncAction::Delete)
            .with_data(serde_json::json!({ "serverId": server_id }))
    });
    let queued = remote_delete.is_some();
    let captures = store
        .withdraw_project(project_id, remote_delete, sync.clock().now_ms())
        .await?;
    log::info!("Deleted project {} with {} captures", project_id, captures);

    if queued {
        sync.request_sync();
    }
    Ok(())
}

pub async fn retry_failed_project<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    project_id: &str,
) -> AppResult<()> {
    sync.retry_failed_project(project_id).await
}

/// Project list for display: the server's list plus projects not confirmed yet
///
/// Offline, or when the remote read fails, only local projects are shown.
pub async fn list_projects_for_display<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
) -> AppResult<Vec<DisplayEntry<RemoteProject, LocalProject>>> {
    let local = sync.store().get_all_projects().await?;
    let remote = if sync.network().current().is_online() {
        match sync.remote().list_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                log::warn!("Could not load remote projects: {}", e);
                return Ok(local_entries(local));
            }
        }
    } else {
        return Ok(local_entries(local));
    };
    Ok(merge_for_display(remote, local))
}

/// A project the user can still act on; deleted ones are gone from here
pub(crate) async fn get_project<R: RemoteApi, C: Clock>(
    sync: &SyncManager<R, C>,
    project_id: &str,
) -> AppResult<LocalProject> {
    sync.store()
        .get_project(project_id)
        .await?
        .filter(|p| p.deleted_at.is_none())
        .ok_or_else(|| AppError::NotFound(format!("project {}", project_id)))
}
