use async_trait::async_trait;

use crate::error::GenerationError;

/// Opaque server-side identifier for a long-running video job.
///
/// Returned by [`GenerationBackend::submit_video_job`] and passed back
/// verbatim on every poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationToken(pub String);

/// Reference image attached to a video request.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Everything the backend needs to start a video job.
#[derive(Debug, Clone)]
pub struct VideoJobRequest {
    /// Wire id of the model, e.g. `veo-3.0-generate-preview`.
    pub model: String,
    pub prompt: String,
    pub sample_count: u32,
    pub reference_image: Option<ImagePayload>,
}

/// Snapshot of a video job as reported by one poll.
#[derive(Debug, Clone)]
pub struct VideoJobStatus {
    pub done: bool,
    /// Where the finished bytes can be fetched from, once `done`.
    pub download_reference: Option<String>,
}

/// One-shot image generation request.
#[derive(Debug, Clone)]
pub struct ImageJobRequest {
    pub model: String,
    pub prompt: String,
    pub sample_count: u32,
    /// Wire aspect ratio, e.g. `16:9`.
    pub aspect_ratio: String,
}

/// A generated image returned inline by the service.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Boundary to the remote generative service.
///
/// Video generation is a long-running operation: submit once, then poll the
/// returned token until `done`, then fetch the bytes. Image generation
/// completes within the submit call. Implementations must be usable from
/// multiple tasks.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn submit_video_job(
        &self,
        request: &VideoJobRequest,
    ) -> Result<OperationToken, GenerationError>;

    async fn poll_video_job(
        &self,
        token: &OperationToken,
    ) -> Result<VideoJobStatus, GenerationError>;

    async fn submit_image_job(
        &self,
        request: &ImageJobRequest,
    ) -> Result<Vec<InlineImage>, GenerationError>;

    /// Fetch finished bytes from a download reference returned by a poll.
    async fn fetch_bytes(&self, reference: &str) -> Result<Vec<u8>, GenerationError>;
}
