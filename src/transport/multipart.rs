use super::StrategyOutcome;
use crate::models::{LocalMedia, MediaType};
use crate::remote::{MediaMetadata, MultipartUpload, RemoteApi};

/// Single request: blob, thumbnail and metadata
pub(super) async fn upload<R: RemoteApi>(
    remote: &R,
    media: &LocalMedia,
    metadata: &MediaMetadata,
    thumbnail_size: u32,
) -> StrategyOutcome {
    let thumbnail = match media.media_type {
        MediaType::Photo => match media_library::create_thumbnail(&media.blob, thumbnail_size) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("Thumbnail for {} failed, uploading without: {}", media.id, e);
                media.thumbnail.clone()
            }
        },
        // videos carry the frame extracted at capture time
        MediaType::Video => media.thumbnail.clone(),
    };

    let request = MultipartUpload {
        metadata,
        blob: &media.blob,
        thumbnail: thumbnail.as_deref(),
    };
    remote
        .upload_multipart(&metadata.project_id, request)
        .await
        .into()
}
