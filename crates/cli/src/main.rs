use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use generation::{
    AspectRatio, GenerationRequest, HistoryItem, ImageConfig, ImageOptions, ReferenceImage,
    RenderOptions, Resolution, Session, VideoConfig, VideoModel,
};
use tracing::{info, warn};
use veo_api::{ApiConfig, GeminiClient};

#[derive(Parser)]
#[command(name = "lanexa-cli")]
#[command(about = "Lanexa Studio CLI - Prompt-to-video and image generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path of the JSON config holding the API key
    #[arg(long, global = true, default_value = "lanexa-config.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a video from a prompt
    Video {
        /// Text or JSON prompt
        prompt: String,

        /// Reference image conditioning the generation
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Model id (see `models`)
        #[arg(short, long, default_value = "veo-3.0-generate-preview")]
        model: String,

        /// Aspect ratio: 16:9 or 9:16
        #[arg(long, default_value = "16:9")]
        aspect_ratio: String,

        /// Resolution: 720p or 1080p
        #[arg(long, default_value = "720p")]
        resolution: String,

        /// Generate without audio
        #[arg(long)]
        no_sound: bool,

        /// Directory results are written into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Generate one or more images from a prompt
    Image {
        /// Text or JSON prompt
        prompt: String,

        /// Number of images to request
        #[arg(short, long, default_value = "1")]
        count: u32,

        /// Aspect ratio: 16:9 or 9:16
        #[arg(long, default_value = "16:9")]
        aspect_ratio: String,

        /// Directory results are written into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Save the API key into the config file
    SetKey {
        key: String,
    },

    /// List available video models
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Video {
            prompt,
            image,
            model,
            aspect_ratio,
            resolution,
            no_sound,
            output,
        } => {
            video_command(
                &cli.config,
                prompt,
                image,
                model,
                aspect_ratio,
                resolution,
                no_sound,
                output,
            )
            .await
        }
        Commands::Image {
            prompt,
            count,
            aspect_ratio,
            output,
        } => image_command(&cli.config, prompt, count, aspect_ratio, output).await,
        Commands::SetKey { key } => set_key_command(&cli.config, key),
        Commands::Models => models_command(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn video_command(
    config_path: &Path,
    prompt: String,
    image: Option<PathBuf>,
    model: String,
    aspect_ratio: String,
    resolution: String,
    no_sound: bool,
    output: PathBuf,
) -> Result<()> {
    let model = VideoModel::from_id(&model).with_context(|| {
        let known: Vec<_> = VideoModel::all().iter().map(|m| m.id()).collect();
        format!("unknown model '{model}'; known models: {}", known.join(", "))
    })?;

    let options = RenderOptions {
        aspect_ratio: parse_aspect_ratio(&aspect_ratio)?,
        resolution: parse_resolution(&resolution)?,
        sound: !no_sound,
    };
    let config = VideoConfig {
        model,
        sample_count: 1,
    };

    let mut request = GenerationRequest::video(prompt, options, config);
    if let Some(path) = image {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        request = request.with_reference_image(ReferenceImage {
            media_type: image_media_type(&path)?,
            bytes,
        });
    }

    run_and_export(config_path, request, &output).await
}

async fn image_command(
    config_path: &Path,
    prompt: String,
    count: u32,
    aspect_ratio: String,
    output: PathBuf,
) -> Result<()> {
    let options = ImageOptions {
        aspect_ratio: parse_aspect_ratio(&aspect_ratio)?,
    };
    let config = ImageConfig {
        sample_count: count,
        ..ImageConfig::default()
    };

    let request = GenerationRequest::image(prompt, options, config);
    run_and_export(config_path, request, &output).await
}

async fn run_and_export(
    config_path: &Path,
    request: GenerationRequest,
    output: &Path,
) -> Result<()> {
    let api_config = ApiConfig::load(config_path);
    let backend = Arc::new(GeminiClient::new(api_config.api_key));
    let mut session = Session::new(backend);

    // Surface driver progress messages while the job runs.
    let progress = session.progress_handle();
    let reporter = tokio::spawn(async move {
        let mut last: Option<String> = None;
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let snapshot = progress.lock().clone();
            if snapshot.message != last {
                if let Some(message) = &snapshot.message {
                    info!("{message}");
                }
                last = snapshot.message;
            }
        }
    });

    let outcome = session.generate(request).await;
    reporter.abort();
    outcome?;

    if let Some(issue) = session.progress().error {
        bail!("{issue}");
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;

    let mut written = 0usize;
    for item in session.ledger().iter() {
        match item {
            HistoryItem::Video(video) => {
                write_blob(&session, &video.video, output, &video.prompt, "video")?;
                if let Some(thumb) = &video.thumbnail {
                    write_blob(&session, thumb, output, &video.prompt, "thumb")?;
                } else {
                    warn!("no thumbnail was produced for this video");
                }
            }
            HistoryItem::Image(img) => {
                write_blob(&session, &img.image, output, &img.prompt, "image")?;
            }
        }
        written += 1;
    }

    info!("wrote {written} result(s) to {}", output.display());
    Ok(())
}

fn write_blob(
    session: &Session,
    handle: &media_store::ResourceHandle,
    output: &Path,
    prompt: &str,
    tag: &str,
) -> Result<()> {
    let blob = session
        .store()
        .resolve(handle)
        .context("result handle no longer resolves")?;

    let mut path = output.join(format!("{}_{tag}", safe_filename(prompt)));
    path.set_extension(extension_for(&blob.media_type));

    // Avoid clobbering a previous result with the same prompt.
    let mut attempt = 1;
    while path.exists() {
        path = output.join(format!("{}_{tag}_{attempt}", safe_filename(prompt)));
        path.set_extension(extension_for(&blob.media_type));
        attempt += 1;
    }

    std::fs::write(&path, blob.bytes.as_slice())
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("saved {}", path.display());
    Ok(())
}

fn set_key_command(config_path: &Path, key: String) -> Result<()> {
    if key.trim().is_empty() {
        bail!("refusing to save an empty API key");
    }
    ApiConfig::with_api_key(key).save(config_path)?;
    info!("API key saved to {}", config_path.display());
    Ok(())
}

fn models_command() -> Result<()> {
    for model in VideoModel::all() {
        println!("{:<32} {}", model.id(), model.name());
    }
    Ok(())
}

fn parse_aspect_ratio(raw: &str) -> Result<AspectRatio> {
    match raw {
        "16:9" => Ok(AspectRatio::Widescreen),
        "9:16" => Ok(AspectRatio::Portrait),
        other => bail!("unsupported aspect ratio '{other}' (use 16:9 or 9:16)"),
    }
}

fn parse_resolution(raw: &str) -> Result<Resolution> {
    match raw {
        "720p" => Ok(Resolution::P720),
        "1080p" => Ok(Resolution::P1080),
        other => bail!("unsupported resolution '{other}' (use 720p or 1080p)"),
    }
}

fn image_media_type(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let media_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        other => bail!("unsupported reference image type '.{other}'"),
    };
    Ok(media_type.to_string())
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "video/mp4" => "mp4",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Filename stem derived from the prompt: first 20 characters, lowercased,
/// anything non-alphanumeric collapsed to underscores.
fn safe_filename(prompt: &str) -> String {
    let stem: String = prompt
        .chars()
        .take(20)
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}
