//! # Transport Selector
//!
//! Picks an upload strategy for a media payload by size and runs it against
//! the remote. Strategies are tried in plan order; a strategy that reports
//! [`StrategyOutcome::Failed`] hands over to the next one in the plan, and the
//! last failure is returned to the caller.
//!
//! | payload         | plan                     |
//! |-----------------|--------------------------|
//! | < 5 MiB         | multipart                |
//! | 5 MiB..20 MiB   | presigned, then multipart|
//! | >= 20 MiB       | chunked (10 MiB chunks)  |

mod chunked;
mod multipart;
mod presigned;

use crate::config::SyncConfig;
use crate::database::LocalStore;
use crate::error::{AppError, AppResult};
use crate::models::{LocalMedia, RemoteMedia};
use crate::remote::{MediaMetadata, RemoteApi};
use crate::services::backoff::Backoff;

pub const MULTIPART_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const PRESIGNED_MAX_BYTES: u64 = 20 * 1024 * 1024;
pub const CHUNK_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Multipart,
    Presigned,
    Chunked { chunks: u32 },
}

impl UploadStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            UploadStrategy::Multipart => "multipart",
            UploadStrategy::Presigned => "presigned",
            UploadStrategy::Chunked { .. } => "chunked",
        }
    }
}

/// Number of fixed-size chunks needed for `size` bytes
pub fn chunk_count(size: u64) -> u32 {
    size.div_ceil(CHUNK_SIZE) as u32
}

/// Strategy for a payload of `size` bytes; depends on nothing else
pub fn select_strategy(size: u64) -> UploadStrategy {
    if size < MULTIPART_MAX_BYTES {
        UploadStrategy::Multipart
    } else if size < PRESIGNED_MAX_BYTES {
        UploadStrategy::Presigned
    } else {
        UploadStrategy::Chunked {
            chunks: chunk_count(size),
        }
    }
}

/// Ordered strategies to try for a payload
pub fn upload_plan(size: u64) -> Vec<UploadStrategy> {
    match select_strategy(size) {
        UploadStrategy::Presigned => vec![UploadStrategy::Presigned, UploadStrategy::Multipart],
        strategy => vec![strategy],
    }
}

/// Result of running one strategy
#[derive(Debug)]
pub enum StrategyOutcome {
    Uploaded(RemoteMedia),
    Failed(AppError),
}

impl From<AppResult<RemoteMedia>> for StrategyOutcome {
    fn from(result: AppResult<RemoteMedia>) -> Self {
        match result {
            Ok(media) => StrategyOutcome::Uploaded(media),
            Err(e) => StrategyOutcome::Failed(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    pub chunk_max_attempts: u32,
    pub chunk_concurrency: usize,
    pub backoff: Backoff,
    pub thumbnail_size: u32,
}

impl TransportSettings {
    pub fn from_sync_config(config: &SyncConfig, thumbnail_size: u32) -> Self {
        Self {
            chunk_max_attempts: config.chunk_max_attempts.max(1),
            chunk_concurrency: config.chunk_concurrency.max(1),
            backoff: Backoff::new(config.initial_delay_ms, config.max_delay_ms),
            thumbnail_size,
        }
    }
}

pub struct TransportSelector<'a, R> {
    remote: &'a R,
    store: &'a LocalStore,
    settings: TransportSettings,
}

impl<'a, R: RemoteApi> TransportSelector<'a, R> {
    pub fn new(remote: &'a R, store: &'a LocalStore, settings: TransportSettings) -> Self {
        Self {
            remote,
            store,
            settings,
        }
    }

    /// Uploads a capture into a confirmed server project
    pub async fn upload(
        &self,
        media: &LocalMedia,
        project_id: &str,
        now_ms: i64,
    ) -> AppResult<RemoteMedia> {
        if media.blob.is_empty() {
            return Err(AppError::Validation(format!(
                "media {} has no local payload",
                media.id
            )));
        }

        let metadata = media_metadata(media, project_id);
        let size = media.blob.len() as u64;
        let plan = upload_plan(size);
        let mut last_error = None;

        for (position, strategy) in plan.iter().enumerate() {
            log::debug!(
                "Uploading {} ({} bytes) via {}",
                media.id,
                size,
                strategy.name()
            );
            let outcome = match strategy {
                UploadStrategy::Multipart => {
                    multipart::upload(self.remote, media, &metadata, self.settings.thumbnail_size)
                        .await
                }
                UploadStrategy::Presigned => {
                    presigned::upload(self.remote, media, &metadata).await
                }
                UploadStrategy::Chunked { chunks } => {
                    chunked::upload(
                        self.remote,
                        self.store,
                        media,
                        &metadata,
                        *chunks,
                        &self.settings,
                        now_ms,
                    )
                    .await
                }
            };

            match outcome {
                StrategyOutcome::Uploaded(remote_media) => {
                    log::info!(
                        "Uploaded {} as {} via {}",
                        media.id,
                        remote_media.id,
                        strategy.name()
                    );
                    return Ok(remote_media);
                }
                StrategyOutcome::Failed(e) => {
                    if let Some(next) = plan.get(position + 1) {
                        log::warn!(
                            "{} upload of {} failed ({}), falling back to {}",
                            strategy.name(),
                            media.id,
                            e,
                            next.name()
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::Other("empty upload plan".to_string())))
    }
}

/// Metadata sent with every upload path
pub fn media_metadata(media: &LocalMedia, project_id: &str) -> MediaMetadata {
    MediaMetadata {
        project_id: project_id.to_string(),
        local_id: media.id.clone(),
        media_type: media.media_type.as_str().to_string(),
        mime_type: media.mime_type.clone(),
        file_name: format!("{}.{}", media.id, extension_for(&media.mime_type)),
        file_size: media.blob.len() as u64,
        caption: media.caption.clone(),
        width: media.width,
        height: media.height,
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_thresholds() {
        assert_eq!(select_strategy(4 * MIB), UploadStrategy::Multipart);
        assert_eq!(select_strategy(10 * MIB), UploadStrategy::Presigned);
        assert_eq!(
            select_strategy(25 * MIB),
            UploadStrategy::Chunked { chunks: 3 }
        );
        assert_eq!(
            select_strategy(32 * MIB),
            UploadStrategy::Chunked { chunks: 4 }
        );
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(select_strategy(MULTIPART_MAX_BYTES - 1), UploadStrategy::Multipart);
        assert_eq!(select_strategy(MULTIPART_MAX_BYTES), UploadStrategy::Presigned);
        assert_eq!(select_strategy(PRESIGNED_MAX_BYTES - 1), UploadStrategy::Presigned);
        assert_eq!(
            select_strategy(PRESIGNED_MAX_BYTES),
            UploadStrategy::Chunked { chunks: 2 }
        );
    }

    #[test]
    fn test_presigned_plan_falls_back_to_multipart() {
        assert_eq!(
            upload_plan(10 * MIB),
            vec![UploadStrategy::Presigned, UploadStrategy::Multipart]
        );
        assert_eq!(upload_plan(MIB), vec![UploadStrategy::Multipart]);
        assert_eq!(upload_plan(40 * MIB).len(), 1);
    }

    #[test]
    fn test_file_name_extension() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("video/mp4"), "mp4");
        assert_eq!(extension_for("application/x-unknown"), "bin");
    }
}
