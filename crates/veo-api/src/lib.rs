//! Remote generative-model boundary.
//!
//! [`GenerationBackend`] is the seam the rest of the application talks
//! through; [`GeminiClient`] is the production implementation against the
//! hosted Veo (video) and Imagen (image) models.

mod client;
mod config;
mod error;
mod types;

pub use client::{GeminiClient, DEFAULT_BASE_URL};
pub use config::{ApiConfig, API_KEY_ENV};
pub use error::GenerationError;
pub use types::{
    GenerationBackend, ImageJobRequest, ImagePayload, InlineImage, OperationToken,
    VideoJobRequest, VideoJobStatus,
};
