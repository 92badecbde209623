#![allow(dead_code)]

use fieldcam::clock::ManualClock;
use fieldcam::config::SyncConfig;
use fieldcam::database::LocalStore;
use fieldcam::error::{AppError, AppResult};
use fieldcam::models::{RemoteMedia, RemoteProject};
use fieldcam::network::{Connectivity, NetworkMonitor, UploadPolicy};
use fieldcam::remote::{
    ChunkedInit, ChunkedSession, MediaMetadata, MultipartUpload, PresignedUpload, ProjectPayload,
    RemoteApi,
};
use fieldcam::services::SyncManager;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fail {
    Network,
    Server,
    Auth,
    NotFound,
}

impl Fail {
    fn error(self, op: &str) -> AppError {
        match self {
            Fail::Network => AppError::Network(format!("injected failure in {}", op)),
            Fail::Server => AppError::Server {
                status: 503,
                message: format!("injected failure in {}", op),
            },
            Fail::Auth => AppError::Unauthorized(format!("injected 401 in {}", op)),
            Fail::NotFound => AppError::NotFound(format!("injected 404 in {}", op)),
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    failures: HashMap<String, Vec<Fail>>,
    next_id: u32,
    projects: Vec<RemoteProject>,
    media: Vec<RemoteMedia>,
    sessions: HashMap<String, BTreeSet<u32>>,
    /// chunks the server held when each completion call came in
    completed_with: Vec<Vec<u32>>,
    multipart_thumbnails: Vec<bool>,
    /// local ids of completed uploads, in completion order
    uploaded: Vec<String>,
    tags: HashMap<String, Vec<String>>,
    annotations: HashMap<String, serde_json::Value>,
    policy: Option<UploadPolicy>,
    policy_delay: Option<Duration>,
}

/// In-memory stand-in for the remote API with scriptable failures
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` calls of `op` fail with `kind`
    pub fn fail(&self, op: &str, kind: Fail, times: usize) {
        let mut state = self.state.lock().unwrap();
        state
            .failures
            .entry(op.to_string())
            .or_default()
            .extend(std::iter::repeat(kind).take(times));
    }

    pub fn set_policy(&self, policy: Option<UploadPolicy>) {
        self.state.lock().unwrap().policy = policy;
    }

    pub fn set_policy_delay(&self, delay: Duration) {
        self.state.lock().unwrap().policy_delay = Some(delay);
    }

    pub fn register_session(&self, upload_id: &str, done: &[u32]) {
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(upload_id.to_string(), done.iter().copied().collect());
    }

    pub fn add_remote_media(&self, media: RemoteMedia) {
        self.state.lock().unwrap().media.push(media);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn completed_with(&self) -> Vec<Vec<u32>> {
        self.state.lock().unwrap().completed_with.clone()
    }

    pub fn uploaded_local_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().uploaded.clone()
    }

    pub fn multipart_thumbnails(&self) -> Vec<bool> {
        self.state.lock().unwrap().multipart_thumbnails.clone()
    }

    pub fn tags_of(&self, photo_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .tags
            .get(photo_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn annotation_of(&self, photo_id: &str) -> Option<serde_json::Value> {
        self.state.lock().unwrap().annotations.get(photo_id).cloned()
    }

    /// Records the call and applies a scripted failure, if any
    fn enter(&self, op: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        if let Some(queue) = state.failures.get_mut(op) {
            if !queue.is_empty() {
                let kind = queue.remove(0);
                return Err(kind.error(op));
            }
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }

    fn created_media(&self, metadata: &MediaMetadata) -> RemoteMedia {
        let media = RemoteMedia {
            id: self.next_id("srv-m"),
            project_id: Some(metadata.project_id.clone()),
            caption: metadata.caption.clone(),
            url: None,
            thumbnail_url: None,
        };
        let mut state = self.state.lock().unwrap();
        state.media.push(media.clone());
        state.uploaded.push(metadata.local_id.clone());
        media
    }
}

impl RemoteApi for FakeRemote {
    async fn create_project(&self, project: &ProjectPayload) -> AppResult<RemoteProject> {
        self.enter("create_project")?;
        let created = RemoteProject {
            id: self.next_id("srv-p"),
            name: project.name.clone(),
            description: project.description.clone(),
        };
        self.state.lock().unwrap().projects.push(created.clone());
        Ok(created)
    }

    async fn update_project(&self, id: &str, project: &ProjectPayload) -> AppResult<()> {
        self.enter("update_project")?;
        let mut state = self.state.lock().unwrap();
        match state.projects.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.name = project.name.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(id.to_string())),
        }
    }

    async fn delete_project(&self, id: &str) -> AppResult<()> {
        self.enter("delete_project")?;
        let mut state = self.state.lock().unwrap();
        let before = state.projects.len();
        state.projects.retain(|p| p.id != id);
        if state.projects.len() == before {
            return Err(AppError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_projects(&self) -> AppResult<Vec<RemoteProject>> {
        self.enter("list_projects")?;
        Ok(self.state.lock().unwrap().projects.clone())
    }

    async fn list_project_media(&self, project_id: &str) -> AppResult<Vec<RemoteMedia>> {
        self.enter("list_project_media")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .media
            .iter()
            .filter(|m| m.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect())
    }

    async fn upload_multipart(
        &self,
        _project_id: &str,
        upload: MultipartUpload<'_>,
    ) -> AppResult<RemoteMedia> {
        self.enter("upload_multipart")?;
        self.state
            .lock()
            .unwrap()
            .multipart_thumbnails
            .push(upload.thumbnail.is_some());
        Ok(self.created_media(upload.metadata))
    }

    async fn request_presigned_upload(&self, _metadata: &MediaMetadata) -> AppResult<PresignedUpload> {
        self.enter("request_presigned_upload")?;
        Ok(PresignedUpload {
            upload_url: "https://objects.example.com/put/1".to_string(),
            session_id: self.next_id("ps"),
        })
    }

    async fn put_presigned(&self, _upload_url: &str, _mime_type: &str, _blob: &[u8]) -> AppResult<()> {
        self.enter("put_presigned")
    }

    async fn complete_presigned(
        &self,
        _session_id: &str,
        metadata: &MediaMetadata,
    ) -> AppResult<RemoteMedia> {
        self.enter("complete_presigned")?;
        Ok(self.created_media(metadata))
    }

    async fn init_chunked_upload(&self, request: &ChunkedInit) -> AppResult<ChunkedSession> {
        self.enter("init_chunked_upload")?;
        let upload_id = self.next_id("up");
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(upload_id.clone(), BTreeSet::new());
        Ok(ChunkedSession {
            upload_id,
            total_chunks: Some(request.total_chunks),
        })
    }

    async fn upload_chunk(&self, upload_id: &str, index: u32, chunk: &[u8]) -> AppResult<()> {
        self.enter(&format!("upload_chunk:{}", index))?;
        assert!(!chunk.is_empty());
        let mut state = self.state.lock().unwrap();
        match state.sessions.get_mut(upload_id) {
            Some(chunks) => {
                chunks.insert(index);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("upload {}", upload_id))),
        }
    }

    async fn complete_chunked_upload(
        &self,
        upload_id: &str,
        metadata: &MediaMetadata,
    ) -> AppResult<RemoteMedia> {
        self.enter("complete_chunked_upload")?;
        let held = {
            let state = self.state.lock().unwrap();
            state
                .sessions
                .get(upload_id)
                .map(|chunks| chunks.iter().copied().collect::<Vec<_>>())
        };
        let Some(held) = held else {
            return Err(AppError::NotFound(format!("upload {}", upload_id)));
        };
        self.state.lock().unwrap().completed_with.push(held);
        Ok(self.created_media(metadata))
    }

    async fn update_media(&self, id: &str, patch: &serde_json::Value) -> AppResult<()> {
        self.enter("update_media")?;
        let mut state = self.state.lock().unwrap();
        match state.media.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.caption = patch["caption"].as_str().map(str::to_string);
                Ok(())
            }
            None => Err(AppError::NotFound(id.to_string())),
        }
    }

    async fn delete_media(&self, id: &str) -> AppResult<()> {
        self.enter("delete_media")?;
        self.state.lock().unwrap().media.retain(|m| m.id != id);
        Ok(())
    }

    async fn add_photo_tags(&self, photo_id: &str, tag_ids: &[String]) -> AppResult<()> {
        self.enter("add_photo_tags")?;
        self.state
            .lock()
            .unwrap()
            .tags
            .entry(photo_id.to_string())
            .or_default()
            .extend(tag_ids.iter().cloned());
        Ok(())
    }

    async fn put_annotation(&self, photo_id: &str, annotation: &serde_json::Value) -> AppResult<()> {
        self.enter("put_annotation")?;
        self.state
            .lock()
            .unwrap()
            .annotations
            .insert(photo_id.to_string(), annotation.clone());
        Ok(())
    }

    async fn delete_annotation(&self, photo_id: &str) -> AppResult<()> {
        self.enter("delete_annotation")?;
        self.state.lock().unwrap().annotations.remove(photo_id);
        Ok(())
    }

    async fn fetch_upload_policy(&self) -> AppResult<UploadPolicy> {
        let delay = self.state.lock().unwrap().policy_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.enter("fetch_upload_policy")?;
        Ok(self.state.lock().unwrap().policy.unwrap_or_default())
    }
}

pub type TestManager = SyncManager<FakeRemote, Arc<ManualClock>>;

pub struct Harness {
    pub manager: TestManager,
    pub remote: Arc<FakeRemote>,
    pub clock: Arc<ManualClock>,
    pub network: NetworkMonitor,
}

impl Harness {
    pub fn new(connectivity: Connectivity) -> Self {
        Self::with_config(connectivity, test_config())
    }

    pub fn with_config(connectivity: Connectivity, config: SyncConfig) -> Self {
        let store = Arc::new(LocalStore::open_in_memory(config.max_queue_size).unwrap());
        let remote = Arc::new(FakeRemote::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let network = NetworkMonitor::new(connectivity);
        let manager = SyncManager::new(
            store,
            remote.clone(),
            network.clone(),
            clock.clone(),
            config,
            128,
        );
        Self {
            manager,
            remote,
            clock,
            network,
        }
    }

    pub fn store(&self) -> &LocalStore {
        self.manager.store()
    }

    /// Moves the clock past any backoff window the tests produce
    pub fn wait_out_backoff(&self) {
        self.clock.advance(60_000);
    }
}

/// Short delays so chunk retries sleep for milliseconds
pub fn test_config() -> SyncConfig {
    SyncConfig {
        initial_delay_ms: 10,
        max_delay_ms: 1_000,
        ..SyncConfig::default()
    }
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}
