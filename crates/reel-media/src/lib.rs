//! FFmpeg-driven composition pipeline for short vertical videos.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout
//! - Progress parsing from `-progress pipe:2`
//! - Asset download and FFprobe inspection
//! - Scene composition (crop, freeze/truncate, captions, audio)
//! - Timeline assembly with background music and the final encode

pub mod captions;
pub mod command;
pub mod encode;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod geometry;
pub mod probe;
pub mod progress;
pub mod scene;
pub mod timeline;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use encode::{encode_timeline, EncodedVideo};
pub use error::{MediaError, MediaResult};
pub use fetch::{AssetFetcher, AssetKind};
pub use geometry::{center_crop, CropRect};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use scene::{compose_scene, prepare_assets, ComposeConfig, ComposedTrack, SceneAssets, ScenePlan};
pub use timeline::{assemble, music_loops, prepare_music, MusicTrack, Timeline};
