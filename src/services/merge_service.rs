//! # Merge Resolver
//!
//! Server-wins reconciliation for list rendering. Remote entities are shown
//! as returned. A local entity is added only when the remote set does not
//! contain its server id and it is still pending, syncing or failed; anything
//! already synced is assumed to be represented by its remote copy.
//!
//! Entities the user deleted are hidden on both sides while the delete is
//! pending. A delete the server kept refusing shows the local entity again,
//! in `error`, so it can be retried.
//!
//! Nothing here touches the store or the queue.

use crate::models::{
    LocalMedia, LocalProject, MediaSyncStatus, ProjectSyncStatus, RemoteMedia, RemoteProject,
};
use std::collections::HashSet;

pub trait RemoteEntity {
    fn remote_id(&self) -> &str;
}

pub trait LocalEntity {
    fn local_id(&self) -> &str;
    fn server_id(&self) -> Option<&str>;
    /// pending, syncing or error
    fn is_unconfirmed(&self) -> bool;
    fn created_at(&self) -> i64;

    /// Deleted on this device, whether or not the server has caught up
    fn is_deleted(&self) -> bool {
        false
    }

    fn is_failed(&self) -> bool {
        false
    }

    fn is_hidden(&self) -> bool {
        self.is_deleted() && !self.is_failed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEntry<R, L> {
    Remote(R),
    Local(L),
}

impl<R: RemoteEntity, L: LocalEntity> DisplayEntry<R, L> {
    /// Identity used for de-duplication: the server id when known
    pub fn display_id(&self) -> &str {
        match self {
            DisplayEntry::Remote(r) => r.remote_id(),
            DisplayEntry::Local(l) => l.server_id().unwrap_or(l.local_id()),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, DisplayEntry::Local(_))
    }
}

/// Remote entries in server order, then unconfirmed local entries newest first
pub fn merge_for_display<R, L>(remote: Vec<R>, local: Vec<L>) -> Vec<DisplayEntry<R, L>>
where
    R: RemoteEntity,
    L: LocalEntity,
{
    let mut seen: HashSet<String> = HashSet::with_capacity(remote.len() + local.len());
    let mut merged = Vec::with_capacity(remote.len() + local.len());
    let deleted: HashSet<&str> = local
        .iter()
        .filter(|l| l.is_deleted())
        .filter_map(|l| l.server_id())
        .collect();

    let remote: Vec<R> = remote
        .into_iter()
        .filter(|r| !deleted.contains(r.remote_id()))
        .collect();

    for entity in remote {
        if seen.insert(entity.remote_id().to_string()) {
            merged.push(DisplayEntry::Remote(entity));
        }
    }

    let mut local_only: Vec<L> = local
        .into_iter()
        .filter(|l| l.is_unconfirmed() && !l.is_hidden())
        .filter(|l| l.server_id().map_or(true, |id| !seen.contains(id)))
        .collect();
    local_only.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

    for entity in local_only {
        let key = entity.server_id().unwrap_or(entity.local_id()).to_string();
        if seen.insert(key) {
            merged.push(DisplayEntry::Local(entity));
        }
    }

    merged
}

/// Local-only listing for when the remote cannot be read
pub fn local_entries<R, L: LocalEntity>(local: Vec<L>) -> Vec<DisplayEntry<R, L>> {
    local
        .into_iter()
        .filter(|l| !l.is_hidden())
        .map(DisplayEntry::Local)
        .collect()
}

impl RemoteEntity for RemoteProject {
    fn remote_id(&self) -> &str {
        &self.id
    }
}

impl RemoteEntity for RemoteMedia {
    fn remote_id(&self) -> &str {
        &self.id
    }
}

impl LocalEntity for LocalProject {
    fn local_id(&self) -> &str {
        &self.id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn is_unconfirmed(&self) -> bool {
        self.sync_status != ProjectSyncStatus::Synced
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn is_failed(&self) -> bool {
        self.sync_status == ProjectSyncStatus::Error
    }
}

impl LocalEntity for LocalMedia {
    fn local_id(&self) -> &str {
        &self.id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn is_unconfirmed(&self) -> bool {
        self.sync_status != MediaSyncStatus::Synced
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn is_failed(&self) -> bool {
        self.sync_status == MediaSyncStatus::Error
    }
}
