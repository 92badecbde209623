use crate::error::AppError;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSyncStatus {
    Pending,
    Synced,
    Error,
}

impl ProjectSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectSyncStatus::Pending => "pending",
            ProjectSyncStatus::Synced => "synced",
            ProjectSyncStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "synced" => ProjectSyncStatus::Synced,
            "error" => ProjectSyncStatus::Error,
            _ => ProjectSyncStatus::Pending,
        }
    }
}

/// A project created on this device, possibly before the server knows it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalProject {
    pub id: String,
    pub server_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub sync_status: ProjectSyncStatus,
    pub created_at: i64,
    pub updated_at: i64,
    /// Set by a user delete; the row is removed once the server confirms it
    pub deleted_at: Option<i64>,
}

impl LocalProject {
    pub fn new(name: String, description: Option<String>, now_ms: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            server_id: None,
            name,
            description,
            sync_status: ProjectSyncStatus::Pending,
            created_at: now_ms,
            updated_at: now_ms,
            deleted_at: None,
        }
    }

    pub fn is_pending_delete(&self) -> bool {
        self.deleted_at.is_some() && self.sync_status != ProjectSyncStatus::Error
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Project name is required".into()));
        }
        if self.name.chars().count() > 200 {
            return Err(AppError::Validation(
                "Project name must be at most 200 characters".into(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Row<'_>> for LocalProject {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        let status: String = row.get("sync_status")?;
        Ok(LocalProject {
            id: row.get("id")?,
            server_id: row.get("server_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            sync_status: ProjectSyncStatus::from_str(&status),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_is_pending() {
        let project = LocalProject::new("Roof survey".to_string(), None, 42);
        assert_eq!(project.sync_status, ProjectSyncStatus::Pending);
        assert!(project.server_id.is_none());
        assert_eq!(project.created_at, 42);
        assert!(project.deleted_at.is_none());
        project.validate().unwrap();
    }

    #[test]
    fn test_blank_name_rejected() {
        let project = LocalProject::new("   ".to_string(), None, 0);
        assert!(matches!(project.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_failed_delete_is_not_pending() {
        let mut project = LocalProject::new("Roof survey".to_string(), None, 1);
        project.deleted_at = Some(2);
        assert!(project.is_pending_delete());

        project.sync_status = ProjectSyncStatus::Error;
        assert!(!project.is_pending_delete());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProjectSyncStatus::Pending,
            ProjectSyncStatus::Synced,
            ProjectSyncStatus::Error,
        ] {
            assert_eq!(ProjectSyncStatus::from_str(status.as_str()), status);
        }
    }
}
