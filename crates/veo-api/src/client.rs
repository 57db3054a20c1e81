//! REST client for the Gemini generative-media API.
//!
//! Video generation goes through `models/{model}:predictLongRunning`, which
//! returns an operation name that is polled with plain GETs until done.
//! Image generation is a synchronous `models/{model}:predict`. Finished
//! video bytes live behind a download URI that expects the API key as a
//! query parameter.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GenerationError;
use crate::types::{
    GenerationBackend, ImageJobRequest, InlineImage, OperationToken, VideoJobRequest,
    VideoJobStatus,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the hosted Veo / Imagen models.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn has_key(&self) -> bool {
        matches!(&self.api_key, Some(k) if !k.trim().is_empty())
    }

    /// The configured key, checked before any network traffic happens.
    fn key(&self) -> Result<&str, GenerationError> {
        match &self.api_key {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(GenerationError::Configuration(
                "no API key configured; set one with `set-key` or the GEMINI_API_KEY env var"
                    .to_string(),
            )),
        }
    }

    /// Download URIs already carry query parameters, so the key is appended
    /// with whichever separator the URI still needs.
    fn download_url(reference: &str, key: &str) -> String {
        let sep = if reference.contains('?') { '&' } else { '?' };
        format!("{reference}{sep}key={key}")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInstance {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<InlineImageData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineImageData {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    sample_count: u32,
}

#[derive(Debug, Serialize)]
struct VideoSubmitBody {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Deserialize)]
struct OperationRef {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoUri>,
}

#[derive(Debug, Deserialize)]
struct VideoUri {
    uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageParameters {
    sample_count: u32,
    aspect_ratio: String,
}

#[derive(Debug, Serialize)]
struct ImageSubmitBody {
    instances: Vec<ImageInstance>,
    parameters: ImageParameters,
}

#[derive(Debug, Deserialize)]
struct ImagePredictResponse {
    #[serde(default)]
    predictions: Vec<InlineImageData>,
}

#[async_trait::async_trait]
impl GenerationBackend for GeminiClient {
    async fn submit_video_job(
        &self,
        request: &VideoJobRequest,
    ) -> Result<OperationToken, GenerationError> {
        let key = self.key()?.to_string();

        let body = VideoSubmitBody {
            instances: vec![VideoInstance {
                prompt: request.prompt.clone(),
                image: request.reference_image.as_ref().map(|img| InlineImageData {
                    bytes_base64_encoded: BASE64.encode(&img.bytes),
                    mime_type: img.media_type.clone(),
                }),
            }],
            parameters: VideoParameters {
                sample_count: request.sample_count,
            },
        };

        let url = format!("{}/models/{}:predictLongRunning", self.base_url, request.model);
        debug!(model = %request.model, "submitting video job");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Submission(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Submission(format!("{status}: {text}")));
        }

        let op: OperationRef = response
            .json()
            .await
            .map_err(|e| GenerationError::Submission(e.to_string()))?;
        Ok(OperationToken(op.name))
    }

    async fn poll_video_job(
        &self,
        token: &OperationToken,
    ) -> Result<VideoJobStatus, GenerationError> {
        let key = self.key()?.to_string();

        let url = format!("{}/{}", self.base_url, token.0);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", key)
            .send()
            .await
            .map_err(|e| GenerationError::Poll(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Poll(format!("{status}: {text}")));
        }

        let op: OperationStatus = response
            .json()
            .await
            .map_err(|e| GenerationError::Poll(e.to_string()))?;

        if let Some(err) = op.error {
            return Err(GenerationError::Poll(
                err.message.unwrap_or_else(|| "operation failed".to_string()),
            ));
        }

        let download_reference = op
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri);

        Ok(VideoJobStatus {
            done: op.done,
            download_reference,
        })
    }

    async fn submit_image_job(
        &self,
        request: &ImageJobRequest,
    ) -> Result<Vec<InlineImage>, GenerationError> {
        let key = self.key()?.to_string();

        let body = ImageSubmitBody {
            instances: vec![ImageInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: ImageParameters {
                sample_count: request.sample_count,
                aspect_ratio: request.aspect_ratio.clone(),
            },
        };

        let url = format!("{}/models/{}:predict", self.base_url, request.model);
        debug!(model = %request.model, "submitting image job");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Submission(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Submission(format!("{status}: {text}")));
        }

        let parsed: ImagePredictResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Submission(e.to_string()))?;

        parsed
            .predictions
            .into_iter()
            .map(|p| {
                Ok(InlineImage {
                    bytes: BASE64
                        .decode(p.bytes_base64_encoded.as_bytes())
                        .map_err(|e| GenerationError::Submission(e.to_string()))?,
                    media_type: p.mime_type,
                })
            })
            .collect()
    }

    async fn fetch_bytes(&self, reference: &str) -> Result<Vec<u8>, GenerationError> {
        let key = self.key()?;
        let url = Self::download_url(reference, key);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerationError::Download(format!(
                "download failed with status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_body_uses_wire_field_names() {
        let body = VideoSubmitBody {
            instances: vec![VideoInstance {
                prompt: "a red fox at dawn".to_string(),
                image: Some(InlineImageData {
                    bytes_base64_encoded: BASE64.encode(b"img"),
                    mime_type: "image/png".to_string(),
                }),
            }],
            parameters: VideoParameters { sample_count: 1 },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["parameters"]["sampleCount"], 1);
        assert_eq!(json["instances"][0]["prompt"], "a red fox at dawn");
        assert_eq!(json["instances"][0]["image"]["mimeType"], "image/png");
        assert!(json["instances"][0]["image"]["bytesBase64Encoded"].is_string());
    }

    #[test]
    fn image_body_uses_wire_field_names() {
        let body = ImageSubmitBody {
            instances: vec![ImageInstance {
                prompt: "poster art".to_string(),
            }],
            parameters: ImageParameters {
                sample_count: 2,
                aspect_ratio: "16:9".to_string(),
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["parameters"]["sampleCount"], 2);
        assert_eq!(json["parameters"]["aspectRatio"], "16:9");
    }

    #[test]
    fn operation_status_parses_finished_video() {
        let raw = r#"{
            "name": "operations/abc",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [
                        { "video": { "uri": "https://dl.example/v.mp4?alt=media" } }
                    ]
                }
            }
        }"#;

        let op: OperationStatus = serde_json::from_str(raw).unwrap();
        assert!(op.done);
        let uri = op
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri);
        assert_eq!(uri.as_deref(), Some("https://dl.example/v.mp4?alt=media"));
    }

    #[test]
    fn operation_status_tolerates_pending_shape() {
        let op: OperationStatus = serde_json::from_str(r#"{"name":"operations/abc"}"#).unwrap();
        assert!(!op.done);
        assert!(op.response.is_none());
    }

    #[test]
    fn download_url_appends_key_with_correct_separator() {
        assert_eq!(
            GeminiClient::download_url("https://dl.example/v.mp4?alt=media", "k1"),
            "https://dl.example/v.mp4?alt=media&key=k1"
        );
        assert_eq!(
            GeminiClient::download_url("https://dl.example/v.mp4", "k1"),
            "https://dl.example/v.mp4?key=k1"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new(None);
        let request = VideoJobRequest {
            model: "veo-3.0-generate-preview".to_string(),
            prompt: "test".to_string(),
            sample_count: 1,
            reference_image: None,
        };

        let err = client.submit_video_job(&request).await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));

        let blank = GeminiClient::new(Some("   ".to_string()));
        let err = blank.fetch_bytes("https://dl.example/v.mp4").await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
    }
}
