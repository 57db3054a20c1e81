//! Request construction and validation.
//!
//! A [`GenerationRequest`] bundles the prompt with a media-specific settings
//! variant, so video jobs can only ever carry video options and image jobs
//! image options.

use serde::{Deserialize, Serialize};

/// Output aspect ratios offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    Widescreen,
    Portrait,
}

impl AspectRatio {
    /// Wire form expected by the service.
    pub fn as_wire(&self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

/// Output resolutions offered to users. Currently advisory: the hosted
/// models pick their own output size, but the choice is kept on the
/// request so history records what was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    P720,
    P1080,
}

impl Resolution {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

/// User-facing knobs for a video run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub sound: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Widescreen,
            resolution: Resolution::P720,
            sound: true,
        }
    }
}

/// Video models available for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoModel {
    Veo2,
    Veo3Preview,
    Veo3FastPreview,
}

impl VideoModel {
    /// Wire id sent to the service.
    pub fn id(&self) -> &'static str {
        match self {
            VideoModel::Veo2 => "veo-2.0-generate-001",
            VideoModel::Veo3Preview => "veo-3.0-generate-preview",
            VideoModel::Veo3FastPreview => "veo-3.0-fast-generate-preview",
        }
    }

    /// Display name for pickers and logs.
    pub fn name(&self) -> &'static str {
        match self {
            VideoModel::Veo2 => "Veo 2",
            VideoModel::Veo3Preview => "Veo 3 (preview)",
            VideoModel::Veo3FastPreview => "Veo 3 Fast (preview)",
        }
    }

    pub fn all() -> &'static [VideoModel] {
        &[
            VideoModel::Veo2,
            VideoModel::Veo3Preview,
            VideoModel::Veo3FastPreview,
        ]
    }

    pub fn from_id(id: &str) -> Option<VideoModel> {
        Self::all().iter().copied().find(|m| m.id() == id)
    }
}

impl Default for VideoModel {
    fn default() -> Self {
        VideoModel::Veo3Preview
    }
}

/// Image models available for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageModel {
    Imagen3,
}

impl ImageModel {
    pub fn id(&self) -> &'static str {
        match self {
            ImageModel::Imagen3 => "imagen-3.0-generate-002",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ImageModel::Imagen3 => "Imagen 3",
        }
    }
}

impl Default for ImageModel {
    fn default() -> Self {
        ImageModel::Imagen3
    }
}

/// Backend-facing configuration for a video run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub model: VideoModel,
    pub sample_count: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            model: VideoModel::default(),
            sample_count: 1,
        }
    }
}

/// User-facing knobs for an image run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub aspect_ratio: AspectRatio,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Widescreen,
        }
    }
}

/// Backend-facing configuration for an image run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub model: ImageModel,
    pub sample_count: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: ImageModel::default(),
            sample_count: 1,
        }
    }
}

/// Per-media settings. The enum shape guarantees a request never mixes
/// video options with an image config or vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestSettings {
    Video {
        options: RenderOptions,
        config: VideoConfig,
    },
    Image {
        options: ImageOptions,
        config: ImageConfig,
    },
}

/// Optional image conditioning a video run.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// A validated-on-use generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub reference_image: Option<ReferenceImage>,
    pub settings: RequestSettings,
}

impl GenerationRequest {
    pub fn video(prompt: impl Into<String>, options: RenderOptions, config: VideoConfig) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image: None,
            settings: RequestSettings::Video { options, config },
        }
    }

    pub fn image(prompt: impl Into<String>, options: ImageOptions, config: ImageConfig) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image: None,
            settings: RequestSettings::Image { options, config },
        }
    }

    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    /// Validation applied before a request is allowed to start.
    ///
    /// Prompts that look like structured JSON (leading `{` or `[`) must
    /// actually parse, so a half-written JSON prompt fails fast instead of
    /// being sent to the model verbatim.
    pub fn prompt_issue(&self) -> Option<String> {
        let trimmed = self.prompt.trim();
        if trimmed.is_empty() {
            return Some("Prompt cannot be empty.".to_string());
        }
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(trimmed).is_err()
        {
            return Some("Invalid JSON format.".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_ids_round_trip() {
        for model in VideoModel::all() {
            assert_eq!(VideoModel::from_id(model.id()), Some(*model));
        }
        assert_eq!(VideoModel::from_id("veo-99"), None);
    }

    #[test]
    fn empty_prompt_is_rejected() {
        let request = GenerationRequest::video(
            "   \n ",
            RenderOptions::default(),
            VideoConfig::default(),
        );
        assert_eq!(request.prompt_issue().as_deref(), Some("Prompt cannot be empty."));
    }

    #[test]
    fn json_looking_prompt_must_parse() {
        let bad = GenerationRequest::video(
            r#"{"scene": "forest""#,
            RenderOptions::default(),
            VideoConfig::default(),
        );
        assert_eq!(bad.prompt_issue().as_deref(), Some("Invalid JSON format."));

        let good = GenerationRequest::video(
            r#"{"scene": "forest"}"#,
            RenderOptions::default(),
            VideoConfig::default(),
        );
        assert_eq!(good.prompt_issue(), None);

        let plain = GenerationRequest::image(
            "a plain text prompt with { inside",
            ImageOptions::default(),
            ImageConfig::default(),
        );
        assert_eq!(plain.prompt_issue(), None);
    }

    #[test]
    fn aspect_ratio_wire_values() {
        assert_eq!(AspectRatio::Widescreen.as_wire(), "16:9");
        assert_eq!(AspectRatio::Portrait.as_wire(), "9:16");
    }
}
