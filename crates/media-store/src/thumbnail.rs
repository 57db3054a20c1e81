//! Best-effort thumbnail extraction from video blobs.
//!
//! Bytes are staged to a temp file, probed with ffprobe, and a single frame
//! is pulled with ffmpeg at a capture time clamped to the video's duration.
//! The frame is scaled to a fixed target width and re-encoded as JPEG.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{BlobStore, ResourceHandle};

/// Target width of the rendered thumbnail, in pixels.
pub const THUMBNAIL_WIDTH: u32 = 320;
/// JPEG quality on a 0-100 scale (0.8 on the usual 0-1 scale).
pub const THUMBNAIL_JPEG_QUALITY: u8 = 80;
/// Preferred capture timestamp, clamped for shorter videos.
pub const CAPTURE_SECONDS: f64 = 1.0;

/// Margin kept before end-of-stream when clamping the capture time.
const SEEK_EPSILON: f64 = 0.05;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("ffmpeg/ffprobe not found on PATH; install FFmpeg to enable thumbnails")]
    DecoderMissing,
    #[error("handle does not resolve to locally held bytes")]
    UnresolvedHandle,
    #[error("video reports no decodable duration")]
    EmptyVideo,
    #[error("ffprobe failed: {0}")]
    Probe(String),
    #[error("frame extraction failed: {0}")]
    Extract(String),
    #[error("thumbnail image processing failed: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeJson {
    format: Option<FfprobeFormat>,
}

/// Decode one frame from a locally held video blob and wrap the scaled
/// JPEG as a new handle owned by the caller.
///
/// Failures here are expected to be degraded to "no thumbnail" by callers;
/// they never invalidate the video itself. No retries.
pub fn extract_thumbnail(
    store: &BlobStore,
    video: &ResourceHandle,
) -> Result<ResourceHandle, ThumbnailError> {
    let blob = store
        .resolve(video)
        .ok_or(ThumbnailError::UnresolvedHandle)?;

    let ffprobe = which::which("ffprobe").map_err(|_| ThumbnailError::DecoderMissing)?;
    let ffmpeg = which::which("ffmpeg").map_err(|_| ThumbnailError::DecoderMissing)?;

    let mut source = tempfile::Builder::new().suffix(".mp4").tempfile()?;
    source.write_all(&blob.bytes)?;
    source.flush()?;

    let duration = probe_duration(&ffprobe, source.path())?;
    let capture = clamp_capture_time(duration).ok_or(ThumbnailError::EmptyVideo)?;
    debug!(duration, capture, "extracting thumbnail frame");

    let frame_file = tempfile::Builder::new().suffix(".png").tempfile()?;
    let output = Command::new(&ffmpeg)
        .arg("-v")
        .arg("error")
        .arg("-ss")
        .arg(format!("{capture:.3}"))
        .arg("-i")
        .arg(source.path())
        .arg("-frames:v")
        .arg("1")
        .arg("-y")
        .arg(frame_file.path())
        .output()?;
    if !output.status.success() {
        return Err(ThumbnailError::Extract(
            String::from_utf8_lossy(&output.stderr).into(),
        ));
    }

    let frame = image::open(frame_file.path())?;
    let height = scaled_height(frame.width(), frame.height());
    let scaled = frame
        .resize_exact(THUMBNAIL_WIDTH, height, FilterType::Triangle)
        .to_rgb8();

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, THUMBNAIL_JPEG_QUALITY);
    scaled.write_with_encoder(encoder)?;

    Ok(store.create(jpeg, "image/jpeg"))
}

fn probe_duration(ffprobe: &Path, input: &Path) -> Result<f64, ThumbnailError> {
    let output = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-print_format")
        .arg("json")
        .arg(input)
        .output()?;
    if !output.status.success() {
        return Err(ThumbnailError::Probe(
            String::from_utf8_lossy(&output.stderr).into(),
        ));
    }

    let parsed: FfprobeJson = serde_json::from_slice(&output.stdout)
        .map_err(|e| ThumbnailError::Probe(e.to_string()))?;
    parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse().ok())
        .ok_or(ThumbnailError::EmptyVideo)
}

/// Clamp the capture time to `min(CAPTURE_SECONDS, duration - epsilon)`,
/// floored at zero. A zero or unreadable duration yields `None`.
fn clamp_capture_time(duration: f64) -> Option<f64> {
    if !duration.is_finite() || duration <= 0.0 {
        return None;
    }
    Some(CAPTURE_SECONDS.min((duration - SEEK_EPSILON).max(0.0)))
}

/// Height for the target width, preserving aspect ratio.
fn scaled_height(width: u32, height: u32) -> u32 {
    let scaled = (THUMBNAIL_WIDTH as f64 / width.max(1) as f64) * height as f64;
    (scaled.round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a capture time");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected ~{expected}, got {actual}"
        );
    }

    #[test]
    fn capture_time_clamps_to_short_videos() {
        assert_close(clamp_capture_time(12.0), 1.0);
        assert_close(clamp_capture_time(1.0), 1.0 - SEEK_EPSILON);
        assert_close(clamp_capture_time(0.5), 0.5 - SEEK_EPSILON);
        assert_close(clamp_capture_time(0.01), 0.0);
    }

    #[test]
    fn zero_duration_video_fails_immediately() {
        assert_eq!(clamp_capture_time(0.0), None);
        assert_eq!(clamp_capture_time(-3.0), None);
        assert_eq!(clamp_capture_time(f64::NAN), None);
    }

    #[test]
    fn scaled_height_preserves_aspect_ratio() {
        assert_eq!(scaled_height(1280, 720), 180);
        assert_eq!(scaled_height(1080, 1920), 569);
        assert_eq!(scaled_height(320, 240), 240);
    }

    #[test]
    fn unresolved_handle_is_rejected() {
        let store = BlobStore::new();
        let remote = ResourceHandle::remote("https://example.com/clip.mp4");

        let err = extract_thumbnail(&store, &remote).unwrap_err();
        assert!(matches!(err, ThumbnailError::UnresolvedHandle));
    }
}
