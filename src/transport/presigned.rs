use super::StrategyOutcome;
use crate::error::AppResult;
use crate::models::{LocalMedia, RemoteMedia};
use crate::remote::{MediaMetadata, RemoteApi};

/// Direct upload to the object store, then a completion call to the backend
pub(super) async fn upload<R: RemoteApi>(
    remote: &R,
    media: &LocalMedia,
    metadata: &MediaMetadata,
) -> StrategyOutcome {
    run(remote, media, metadata).await.into()
}

async fn run<R: RemoteApi>(
    remote: &R,
    media: &LocalMedia,
    metadata: &MediaMetadata,
) -> AppResult<RemoteMedia> {
    let target = remote.request_presigned_upload(metadata).await?;
    log::debug!("Presigned session {} for {}", target.session_id, media.id);
    remote
        .put_presigned(&target.upload_url, &media.mime_type, &media.blob)
        .await?;
    remote.complete_presigned(&target.session_id, metadata).await
}
