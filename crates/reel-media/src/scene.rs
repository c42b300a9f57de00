//! Scene composition.
//!
//! A scene goes through a fixed chain of stages, each a pure function from
//! one [`ScenePlan`] to the next:
//!
//! 1. `ScenePlan::fetched`: resolve the authoritative duration from the
//!    prefetched assets (narration length, explicit duration, or default)
//! 2. `normalized`: center-crop and scale the visual to the target frame
//! 3. `extended`: hold the last video frame or truncate to the duration
//! 4. `overlaid`: clip word timings into captions
//! 5. `with_audio`: narration padded/trimmed to the duration, or silence
//!
//! Only [`compose_scene`] touches the filesystem and runs FFmpeg.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use reel_models::{EncodingConfig, FrameSize, Scene, Visual, WordTiming, DEFAULT_SCENE_DURATION_SECS};

use crate::captions::{build_ass, clip_to_scene, fallback_timings};
use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::error::MediaResult;
use crate::fetch::{AssetFetcher, AssetKind};
use crate::filters;
use crate::geometry::center_crop;
use crate::probe::probe_media;

/// Settings shared by every scene of a render.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeConfig {
    /// Output frame size
    pub frame: FrameSize,
    /// Encoding settings (intermediates derive from these)
    pub encoding: EncodingConfig,
    /// Slow zoom on still images and held frames
    pub ken_burns: bool,
    /// Scene length when neither narration nor explicit duration is known
    pub default_duration: f64,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            frame: FrameSize::default(),
            encoding: EncodingConfig::default(),
            ken_burns: false,
            default_duration: DEFAULT_SCENE_DURATION_SECS,
        }
    }
}

impl ComposeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut encoding = defaults.encoding;
        if let Some(fps) = std::env::var("RENDER_FPS").ok().and_then(|s| s.parse().ok()) {
            encoding = encoding.with_fps(fps);
        }
        if let Ok(preset) = std::env::var("RENDER_PRESET") {
            encoding = encoding.with_preset(preset);
        }
        if let Ok(bitrate) = std::env::var("RENDER_VIDEO_BITRATE") {
            encoding.video_bitrate = bitrate;
        }
        if let Ok(bitrate) = std::env::var("RENDER_AUDIO_BITRATE") {
            encoding.audio_bitrate = bitrate;
        }

        Self {
            frame: std::env::var("RENDER_FRAME_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.frame),
            encoding,
            ken_burns: std::env::var("RENDER_KEN_BURNS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.ken_burns),
            default_duration: std::env::var("RENDER_DEFAULT_SCENE_SECS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(defaults.default_duration),
        }
    }
}

/// Visual source of a scene after fetching and probing.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualAsset {
    Video {
        path: PathBuf,
        width: u32,
        height: u32,
        duration: f64,
    },
    Image {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    Blank,
}

/// Narration audio after fetching and probing.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationAsset {
    pub path: PathBuf,
    pub duration: f64,
}

/// Everything fetched for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAssets {
    pub index: usize,
    pub visual: VisualAsset,
    pub narration: Option<NarrationAsset>,
}

impl SceneAssets {
    /// Assets for a scene with nothing fetched.
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            visual: VisualAsset::Blank,
            narration: None,
        }
    }
}

/// Audio track of a composed scene.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPlan {
    /// Not decided yet
    Unresolved,
    Narration(PathBuf),
    Silence,
}

/// Immutable description of how one scene will be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePlan {
    pub index: usize,
    /// Authoritative duration in seconds
    pub duration: f64,
    pub visual: VisualAsset,
    pub narration: Option<PathBuf>,
    /// Filters applied to the visual stream, in order
    pub video_filters: Vec<String>,
    pub captions: Vec<WordTiming>,
    pub audio: AudioPlan,
}

/// A rendered scene on scratch storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedTrack {
    pub index: usize,
    pub path: PathBuf,
    /// Exact duration; never renormalized downstream
    pub duration: f64,
}

impl ScenePlan {
    /// Stage 1: resolve the authoritative duration.
    pub fn fetched(scene: &Scene, assets: SceneAssets, config: &ComposeConfig) -> Self {
        let duration = match &assets.narration {
            Some(n) => n.duration,
            None => scene.fallback_duration(config.default_duration),
        };

        Self {
            index: assets.index,
            duration,
            visual: assets.visual,
            narration: assets.narration.map(|n| n.path),
            video_filters: Vec::new(),
            captions: Vec::new(),
            audio: AudioPlan::Unresolved,
        }
    }

    /// Stage 2: crop to the target aspect and scale to the exact frame size.
    pub fn normalized(self, config: &ComposeConfig) -> Self {
        let mut video_filters = self.video_filters.clone();
        let fps = config.encoding.fps;

        match &self.visual {
            VisualAsset::Video { width, height, .. } => {
                let rect = center_crop(*width, *height, config.frame);
                video_filters.push(filters::crop_and_scale(&rect, config.frame));
                video_filters.push(format!("fps={}", fps));
            }
            VisualAsset::Image { width, height, .. } => {
                let rect = center_crop(*width, *height, config.frame);
                video_filters.push(filters::crop_and_scale(&rect, config.frame));
                if config.ken_burns {
                    video_filters.push(filters::ken_burns(config.frame, fps));
                }
            }
            VisualAsset::Blank => {}
        }

        Self { video_filters, ..self }
    }

    /// Stage 3: reconcile the visual length with the authoritative duration.
    pub fn extended(self, config: &ComposeConfig) -> Self {
        let mut video_filters = self.video_filters.clone();

        if let VisualAsset::Video { duration: clip, .. } = &self.visual {
            if *clip < self.duration {
                video_filters.push(filters::freeze_last_frame(self.duration - clip));
                if config.ken_burns {
                    video_filters.push(filters::freeze_zoom(*clip, config.frame, config.encoding.fps));
                }
            }
        }
        video_filters.push(filters::trim_video(self.duration));

        Self { video_filters, ..self }
    }

    /// Stage 4: captions from word timings, or evenly spread narration text.
    pub fn overlaid(self, scene: &Scene) -> Self {
        let source = if scene.words().is_empty() {
            scene
                .narration
                .as_deref()
                .filter(|_| self.narration.is_some())
                .map(|text| fallback_timings(text, self.duration))
                .unwrap_or_default()
        } else {
            scene.words().to_vec()
        };

        let captions = clip_to_scene(&source, self.duration);
        Self { captions, ..self }
    }

    /// Stage 5: narration or silence for exactly the scene duration.
    pub fn with_audio(self) -> Self {
        let audio = match &self.narration {
            Some(path) => AudioPlan::Narration(path.clone()),
            None => AudioPlan::Silence,
        };
        Self { audio, ..self }
    }

    /// Run every stage in order.
    pub fn plan(scene: &Scene, assets: SceneAssets, config: &ComposeConfig) -> Self {
        Self::fetched(scene, assets, config)
            .normalized(config)
            .extended(config)
            .overlaid(scene)
            .with_audio()
    }

    /// Build the FFmpeg invocation for this plan.
    pub fn to_command(&self, config: &ComposeConfig, output: &Path, subtitles: Option<&Path>) -> FfmpegCommand {
        let fps = config.encoding.fps;
        let sample_rate = config.encoding.sample_rate;

        let visual_input = match &self.visual {
            VisualAsset::Video { path, .. } => FfmpegInput::file(path),
            VisualAsset::Image { path, .. } => FfmpegInput::file(path).args([
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                fps.to_string(),
                "-t".to_string(),
                format!("{:.3}", self.duration),
            ]),
            VisualAsset::Blank => {
                FfmpegInput::lavfi(filters::black_frame_source(config.frame, fps), self.duration)
            }
        };

        let (audio_input, audio_fit) = match &self.audio {
            AudioPlan::Narration(path) => (FfmpegInput::file(path), filters::fit_audio(self.duration)),
            AudioPlan::Silence | AudioPlan::Unresolved => (
                FfmpegInput::lavfi(filters::silence_source(sample_rate), self.duration),
                filters::trim_audio(self.duration),
            ),
        };

        let mut video_chain = self.video_filters.clone();
        if let Some(path) = subtitles {
            video_chain.push(filters::burn_subtitles(path));
        }
        video_chain.push("format=yuv420p".to_string());

        let graph = format!(
            "[0:v]{}[v];[1:a]{},{}[a]",
            video_chain.join(","),
            audio_fit,
            filters::audio_format(sample_rate)
        );

        FfmpegCommand::new(output)
            .input(visual_input)
            .input(audio_input)
            .filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .output_args(config.encoding.intermediate().to_ffmpeg_args())
            .output_duration(self.duration)
    }
}

/// Fetch and probe a scene's assets, degrading instead of failing.
///
/// A visual that cannot be fetched or probed becomes a black frame; narration
/// that cannot be fetched or probed is dropped so the scene falls back to its
/// explicit or default duration.
pub async fn prepare_assets(fetcher: &AssetFetcher, scene: &Scene, index: usize, dir: &Path) -> SceneAssets {
    let visual = match scene.visual() {
        Visual::Video(url) => fetch_visual(fetcher, url, AssetKind::Video, index, dir).await,
        Visual::Image(url) => fetch_visual(fetcher, url, AssetKind::Image, index, dir).await,
        Visual::Blank => VisualAsset::Blank,
    };

    let narration = match &scene.audio_url {
        Some(url) => fetch_narration(fetcher, url, index, dir).await,
        None => None,
    };

    SceneAssets {
        index,
        visual,
        narration,
    }
}

async fn fetch_visual(fetcher: &AssetFetcher, url: &str, kind: AssetKind, index: usize, dir: &Path) -> VisualAsset {
    let stem = format!("scene_{}_visual", index);
    let path = match fetcher.fetch(url, kind, dir, &stem).await {
        Ok(path) => path,
        Err(e) => {
            warn!(scene = index, error = %e, "Visual fetch failed, using black frame");
            return VisualAsset::Blank;
        }
    };

    let info = match probe_media(&path).await {
        Ok(info) if info.has_dimensions() => info,
        Ok(_) => {
            warn!(scene = index, "Visual has no frame dimensions, using black frame");
            return VisualAsset::Blank;
        }
        Err(e) => {
            warn!(scene = index, error = %e, "Visual probe failed, using black frame");
            return VisualAsset::Blank;
        }
    };

    // A clip with no measurable length is treated as a still
    if kind == AssetKind::Video && info.duration > 0.0 {
        VisualAsset::Video {
            path,
            width: info.width,
            height: info.height,
            duration: info.duration,
        }
    } else {
        VisualAsset::Image {
            path,
            width: info.width,
            height: info.height,
        }
    }
}

async fn fetch_narration(fetcher: &AssetFetcher, url: &str, index: usize, dir: &Path) -> Option<NarrationAsset> {
    let stem = format!("scene_{}_audio", index);
    let path = match fetcher.fetch(url, AssetKind::Audio, dir, &stem).await {
        Ok(path) => path,
        Err(e) => {
            warn!(scene = index, error = %e, "Narration fetch failed, using fallback duration");
            return None;
        }
    };

    match probe_media(&path).await {
        Ok(info) if info.has_audio && info.duration > 0.0 => Some(NarrationAsset {
            path,
            duration: info.duration,
        }),
        Ok(_) => {
            warn!(scene = index, "Narration has no usable audio, using fallback duration");
            None
        }
        Err(e) => {
            warn!(scene = index, error = %e, "Narration probe failed, using fallback duration");
            None
        }
    }
}

/// Render a plan into a composed track under `dir`.
pub async fn compose_scene(
    plan: &ScenePlan,
    config: &ComposeConfig,
    runner: &FfmpegRunner,
    dir: &Path,
) -> MediaResult<ComposedTrack> {
    let output = dir.join(format!("scene_{}.mp4", plan.index));

    let subtitles = match build_ass(&plan.captions, config.frame) {
        Some(doc) => {
            let path = dir.join(format!("scene_{}.ass", plan.index));
            fs::write(&path, doc).await?;
            Some(path)
        }
        None => None,
    };

    let cmd = plan.to_command(config, &output, subtitles.as_deref());
    debug!(scene = plan.index, duration = plan.duration, "Composing scene");
    runner.run(&cmd).await?;

    info!(
        scene = plan.index,
        duration = plan.duration,
        captions = plan.captions.len(),
        "Scene composed"
    );

    Ok(ComposedTrack {
        index: plan.index,
        path: output,
        duration: plan.duration,
    })
}
