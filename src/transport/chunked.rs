//! Chunked upload with a persisted server session
//!
//! The `uploadId` and the set of confirmed chunks live in the store, so an
//! upload interrupted by a restart continues where it stopped. If the server
//! has forgotten the session (404) the file is sent again from chunk 0, once.

use super::{StrategyOutcome, TransportSettings, CHUNK_SIZE};
use crate::database::LocalStore;
use crate::error::{AppError, AppResult};
use crate::models::{LocalMedia, RemoteMedia, UploadSession};
use crate::remote::{ChunkedInit, MediaMetadata, RemoteApi};
use futures::stream::{self, StreamExt};
use std::ops::Range;

pub(super) async fn upload<R: RemoteApi>(
    remote: &R,
    store: &LocalStore,
    media: &LocalMedia,
    metadata: &MediaMetadata,
    chunks: u32,
    settings: &TransportSettings,
    now_ms: i64,
) -> StrategyOutcome {
    let mut session = match open_session(remote, store, media, metadata, chunks, now_ms).await {
        Ok(session) => session,
        Err(e) => return StrategyOutcome::Failed(e),
    };

    let mut restarted = false;
    loop {
        match attempt(remote, store, media, metadata, &session, settings).await {
            Ok(created) => {
                if let Err(e) = store.clear_upload_session(&media.id).await {
                    log::warn!("Could not clear upload session of {}: {}", media.id, e);
                }
                return StrategyOutcome::Uploaded(created);
            }
            Err(AppError::NotFound(msg)) if !restarted => {
                log::warn!(
                    "Upload session {} of {} is gone ({}), restarting from chunk 0",
                    session.upload_id,
                    media.id,
                    msg
                );
                restarted = true;
                if let Err(e) = store.clear_upload_session(&media.id).await {
                    return StrategyOutcome::Failed(e);
                }
                session = match open_session(remote, store, media, metadata, chunks, now_ms).await
                {
                    Ok(session) => session,
                    Err(e) => return StrategyOutcome::Failed(e),
                };
            }
            Err(e) => return StrategyOutcome::Failed(e),
        }
    }
}

/// Reuses a stored session with the same geometry, or starts a new one
async fn open_session<R: RemoteApi>(
    remote: &R,
    store: &LocalStore,
    media: &LocalMedia,
    metadata: &MediaMetadata,
    chunks: u32,
    now_ms: i64,
) -> AppResult<UploadSession> {
    if let Some(existing) = store.get_upload_session(&media.id).await? {
        if existing.total_chunks == chunks && existing.chunk_size == CHUNK_SIZE {
            log::info!(
                "Resuming upload {} of {} ({}/{} chunks done)",
                existing.upload_id,
                media.id,
                existing.completed_chunks.len(),
                chunks
            );
            return Ok(existing);
        }
        store.clear_upload_session(&media.id).await?;
    }

    let init = ChunkedInit {
        file_name: metadata.file_name.clone(),
        file_size: metadata.file_size,
        mime_type: metadata.mime_type.clone(),
        chunk_size: CHUNK_SIZE,
        total_chunks: chunks,
    };
    let created = remote.init_chunked_upload(&init).await?;
    if let Some(expected) = created.total_chunks {
        if expected != chunks {
            return Err(AppError::MalformedResponse(format!(
                "server expects {} chunks, payload has {}",
                expected, chunks
            )));
        }
    }

    let session = UploadSession {
        media_id: media.id.clone(),
        upload_id: created.upload_id,
        total_chunks: chunks,
        chunk_size: CHUNK_SIZE,
        completed_chunks: Vec::new(),
        created_at: now_ms,
    };
    store.save_upload_session(&session).await?;
    Ok(session)
}

/// Sends every missing chunk, then asks the server to assemble the file
async fn attempt<R: RemoteApi>(
    remote: &R,
    store: &LocalStore,
    media: &LocalMedia,
    metadata: &MediaMetadata,
    session: &UploadSession,
    settings: &TransportSettings,
) -> AppResult<RemoteMedia> {
    let upload_id = session.upload_id.as_str();
    let blob = media.blob.as_slice();
    let media_id = media.id.as_str();

    let results: Vec<(u32, AppResult<()>)> = stream::iter(session.missing_chunks())
        .map(move |index| async move {
            let range = chunk_range(index, blob.len() as u64);
            let result = send_chunk(remote, upload_id, index, &blob[range], settings).await;
            if result.is_ok() {
                if let Err(e) = store.mark_chunk_uploaded(media_id, index).await {
                    log::warn!("Could not record chunk {} of {}: {}", index, media_id, e);
                }
            }
            (index, result)
        })
        .buffer_unordered(settings.chunk_concurrency)
        .collect()
        .await;

    let mut first_error = None;
    for (index, result) in results {
        if let Err(e) = result {
            log::warn!("Chunk {} of {} failed: {}", index, media_id, e);
            // a forgotten session wins so the caller can restart
            let replace = first_error.is_none() || matches!(e, AppError::NotFound(_));
            if replace {
                first_error = Some(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    remote.complete_chunked_upload(upload_id, metadata).await
}

/// One chunk with its own retry counter
async fn send_chunk<R: RemoteApi>(
    remote: &R,
    upload_id: &str,
    index: u32,
    chunk: &[u8],
    settings: &TransportSettings,
) -> AppResult<()> {
    let mut attempt = 0;
    loop {
        match remote.upload_chunk(upload_id, index, chunk).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt + 1 < settings.chunk_max_attempts => {
                let delay = settings.backoff.jittered(attempt);
                log::debug!(
                    "Chunk {} attempt {} failed ({}), retrying in {:?}",
                    index,
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn chunk_range(index: u32, len: u64) -> Range<usize> {
    let start = (index as u64 * CHUNK_SIZE).min(len);
    let end = (start + CHUNK_SIZE).min(len);
    start as usize..end as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges_cover_payload() {
        let len = 32 * 1024 * 1024;
        let ranges: Vec<_> = (0..4).map(|i| chunk_range(i, len)).collect();
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[3].end, len as usize);
        assert_eq!(ranges[3].len(), 2 * 1024 * 1024);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }
}
