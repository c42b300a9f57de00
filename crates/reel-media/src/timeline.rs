//! Timeline assembly: scene concatenation and background music.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reel_models::encoding::DEFAULT_SAMPLE_RATE;

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::error::{MediaError, MediaResult};
use crate::fetch::{AssetFetcher, AssetKind};
use crate::filters;
use crate::probe::probe_media;
use crate::scene::ComposedTrack;

/// Background music on scratch storage.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicTrack {
    pub path: PathBuf,
    pub duration: f64,
}

/// Extra plays of a music track needed to cover `timeline` seconds.
///
/// With `n` extra loops the music covers `(n + 1) * music` seconds, the
/// smallest whole number of plays reaching the timeline end. The surplus is
/// trimmed away.
pub fn music_loops(timeline: f64, music: f64) -> u32 {
    if music <= 0.0 || timeline <= music {
        return 0;
    }
    ((timeline / music).ceil() as u32).saturating_sub(1)
}

/// Concatenated scenes plus optional music, ready to encode.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    inputs: Vec<FfmpegInput>,
    filter: String,
    /// Total length in seconds
    pub duration: f64,
    pub scene_count: usize,
    pub has_music: bool,
}

impl Timeline {
    /// Output labels produced by the filter graph.
    pub const VIDEO_LABEL: &'static str = "[vout]";
    pub const AUDIO_LABEL: &'static str = "[aout]";

    /// FFmpeg command with inputs, graph and stream mapping; no codec args.
    pub fn to_command(&self, output: &Path) -> FfmpegCommand {
        let cmd = self
            .inputs
            .iter()
            .cloned()
            .fold(FfmpegCommand::new(output), |cmd, input| cmd.input(input));

        cmd.filter_complex(self.filter.clone())
            .map(Self::VIDEO_LABEL)
            .map(Self::AUDIO_LABEL)
            .output_duration(self.duration)
    }

    pub fn filter_graph(&self) -> &str {
        &self.filter
    }
}

/// Concatenate composed tracks in order and lay music under them.
pub fn assemble(tracks: &[ComposedTrack], music: Option<&MusicTrack>) -> MediaResult<Timeline> {
    if tracks.is_empty() {
        return Err(MediaError::NoValidScenes);
    }

    let mut ordered: Vec<&ComposedTrack> = tracks.iter().collect();
    ordered.sort_by_key(|t| t.index);

    let duration: f64 = ordered.iter().map(|t| t.duration).sum();

    let mut inputs: Vec<FfmpegInput> = ordered.iter().map(|t| FfmpegInput::file(&t.path)).collect();
    let labels: Vec<(String, String)> = (0..ordered.len())
        .map(|i| (format!("{}:v", i), format!("{}:a", i)))
        .collect();

    let mut filter = match music {
        Some(_) => filters::concat(&labels, "vout", "acat"),
        None => filters::concat(&labels, "vout", "aout"),
    };

    if let Some(track) = music {
        let music_idx = inputs.len();
        let loops = music_loops(duration, track.duration);
        let input = if loops > 0 {
            FfmpegInput::file(&track.path).args(["-stream_loop".to_string(), loops.to_string()])
        } else {
            FfmpegInput::file(&track.path)
        };
        inputs.push(input);

        filter.push_str(&format!(
            ";[{}:a]{},{},{}[music];{}",
            music_idx,
            filters::trim_audio(duration),
            filters::music_gain(),
            filters::audio_format(DEFAULT_SAMPLE_RATE),
            filters::mix_under("acat", "music", "aout")
        ));
    }

    Ok(Timeline {
        inputs,
        filter,
        duration,
        scene_count: ordered.len(),
        has_music: music.is_some(),
    })
}

/// Fetch and probe background music; a failure means rendering without it.
pub async fn prepare_music(fetcher: &AssetFetcher, url: &str, dir: &Path) -> Option<MusicTrack> {
    let path = match fetcher.fetch(url, AssetKind::Audio, dir, "bg_music").await {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "Background music fetch failed, rendering without music");
            return None;
        }
    };

    match probe_media(&path).await {
        Ok(info) if info.has_audio && info.duration > 0.0 => {
            info!(duration = info.duration, "Background music ready");
            Some(MusicTrack {
                path,
                duration: info.duration,
            })
        }
        Ok(_) => {
            warn!("Background music has no usable audio, rendering without music");
            None
        }
        Err(e) => {
            warn!(error = %e, "Background music probe failed, rendering without music");
            None
        }
    }
}
