//! Runs one generation job end to end.
//!
//! The driver owns no state of its own: it takes a request, talks to the
//! backend, and materializes results into the blob store, reporting progress
//! through an event sink. Error recovery is the caller's job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use media_store::{extract_thumbnail, BlobStore, HandleGuard, ResourceHandle};
use tracing::{info, warn};
use veo_api::{
    GenerationBackend, GenerationError, ImageJobRequest, ImagePayload, VideoJobRequest,
};

use crate::history::{HistoryItem, ImageItem, VideoItem};
use crate::request::{GenerationRequest, RequestSettings};
use crate::session::Phase;

/// Fixed delay between successive polls of a running video job.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Messages cycled through while a video job is in flight. After the list
/// is exhausted the last message repeats until the job finishes.
pub const POLL_MESSAGES: [&str; 5] = [
    "Analyzing prompt and image...",
    "Allocating creative resources...",
    "Compositing video frames...",
    "Rendering final output...",
    "Almost there, adding finishing touches...",
];

const VIDEO_MEDIA_TYPE: &str = "video/mp4";

/// Progress notifications emitted while a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Phase(Phase),
    Message(String),
}

/// Executes generation requests against a backend.
#[derive(Clone)]
pub struct JobDriver {
    backend: Arc<dyn GenerationBackend>,
    store: BlobStore,
}

impl JobDriver {
    pub fn new(backend: Arc<dyn GenerationBackend>, store: BlobStore) -> Self {
        Self { backend, store }
    }

    /// Run a request to completion. On success every returned item's
    /// handles are live in the store; on error nothing is left behind.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        sink: &mut dyn FnMut(JobEvent),
    ) -> Result<Vec<HistoryItem>, GenerationError> {
        match &request.settings {
            RequestSettings::Video { config, .. } => {
                let item = self.run_video(request, config.model.id(), config.sample_count, sink).await?;
                Ok(vec![item])
            }
            RequestSettings::Image { options, config } => {
                self.run_image(
                    request,
                    config.model.id(),
                    config.sample_count,
                    options.aspect_ratio.as_wire(),
                    sink,
                )
                .await
            }
        }
    }

    async fn run_video(
        &self,
        request: &GenerationRequest,
        model: &str,
        sample_count: u32,
        sink: &mut dyn FnMut(JobEvent),
    ) -> Result<HistoryItem, GenerationError> {
        sink(JobEvent::Message(
            "Initializing video generation...".to_string(),
        ));

        let job = VideoJobRequest {
            model: model.to_string(),
            prompt: request.prompt.clone(),
            sample_count,
            reference_image: request.reference_image.as_ref().map(|img| ImagePayload {
                bytes: img.bytes.clone(),
                media_type: img.media_type.clone(),
            }),
        };
        let token = self.backend.submit_video_job(&job).await?;
        info!(token = %token.0, model, "video job submitted");

        sink(JobEvent::Phase(Phase::Polling));
        sink(JobEvent::Message(
            "Video processing started. This may take a few minutes...".to_string(),
        ));

        let mut tick: usize = 0;
        let status = loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            tick += 1;
            let idx = (tick - 1).min(POLL_MESSAGES.len() - 1);
            sink(JobEvent::Message(POLL_MESSAGES[idx].to_string()));

            let status = self.backend.poll_video_job(&token).await?;
            if status.done {
                break status;
            }
        };

        let reference = status
            .download_reference
            .ok_or(GenerationError::ResultMissing)?;

        sink(JobEvent::Phase(Phase::Resolving));
        sink(JobEvent::Message("Downloading video data...".to_string()));

        let bytes = self.backend.fetch_bytes(&reference).await?;
        let guard = HandleGuard::new(
            self.store.clone(),
            self.store.create(bytes, VIDEO_MEDIA_TYPE),
        );

        let thumbnail = self.try_thumbnail(guard.handle());
        let created_at = Utc::now();

        Ok(HistoryItem::Video(VideoItem {
            id: created_at.to_rfc3339(),
            prompt: request.prompt.clone(),
            video: guard.into_handle(),
            thumbnail,
            created_at,
        }))
    }

    async fn run_image(
        &self,
        request: &GenerationRequest,
        model: &str,
        sample_count: u32,
        aspect_ratio: &str,
        sink: &mut dyn FnMut(JobEvent),
    ) -> Result<Vec<HistoryItem>, GenerationError> {
        sink(JobEvent::Message("Generating images...".to_string()));

        let job = ImageJobRequest {
            model: model.to_string(),
            prompt: request.prompt.clone(),
            sample_count,
            aspect_ratio: aspect_ratio.to_string(),
        };
        let images = self.backend.submit_image_job(&job).await?;
        if images.is_empty() {
            return Err(GenerationError::Submission(
                "model returned no images".to_string(),
            ));
        }

        // One timestamp for the whole batch so the ids share a prefix and
        // the batch sorts as a unit.
        let created_at = Utc::now();
        let items = images
            .into_iter()
            .enumerate()
            .map(|(idx, image)| {
                HistoryItem::Image(ImageItem {
                    id: format!("{}-{idx}", created_at.to_rfc3339()),
                    prompt: request.prompt.clone(),
                    image: self.store.create(image.bytes, &image.media_type),
                    created_at,
                })
            })
            .collect();
        Ok(items)
    }

    /// Thumbnail extraction is best effort: any failure is logged and the
    /// video keeps a `None` thumbnail.
    fn try_thumbnail(&self, video: &ResourceHandle) -> Option<ResourceHandle> {
        match extract_thumbnail(&self.store, video) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "thumbnail extraction failed; continuing without one");
                None
            }
        }
    }
}
