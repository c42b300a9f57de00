//! FFmpeg filter definitions.

use std::path::Path;

use reel_models::FrameSize;

use crate::geometry::CropRect;

/// Gain applied to background music under narration.
pub const MUSIC_VOLUME: f64 = 0.1;

/// Ken Burns zoom added per output frame for still images.
pub const KEN_BURNS_STEP: f64 = 0.0015;

/// Maximum Ken Burns zoom factor.
pub const KEN_BURNS_MAX: f64 = 1.15;

/// Zoom rate applied while a video's last frame is held, per second.
pub const FREEZE_ZOOM_PER_SEC: f64 = 0.03;

/// Crop to `rect`, then scale to exactly `target` with square pixels.
pub fn crop_and_scale(rect: &CropRect, target: FrameSize) -> String {
    format!(
        "{},scale={}:{}:flags=lanczos,setsar=1",
        rect.to_filter(),
        target.width,
        target.height
    )
}

/// Solid black frame source of the target size.
pub fn black_frame_source(target: FrameSize, fps: u32) -> String {
    format!("color=c=black:s={}:r={}", target.as_ffmpeg_size(), fps)
}

/// Silent stereo audio source.
pub fn silence_source(sample_rate: u32) -> String {
    format!("anullsrc=channel_layout=stereo:sample_rate={}", sample_rate)
}

/// Slow center zoom over a still image, one output frame per input frame.
pub fn ken_burns(target: FrameSize, fps: u32) -> String {
    format!(
        "zoompan=z='min({max},1+{step}*on)':d=1:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={size}:fps={fps}",
        max = KEN_BURNS_MAX,
        step = KEN_BURNS_STEP,
        size = target.as_ffmpeg_size(),
        fps = fps
    )
}

/// Gentle zoom that starts once playback passes `from_secs`.
pub fn freeze_zoom(from_secs: f64, target: FrameSize, fps: u32) -> String {
    format!(
        "zoompan=z='if(gte(it,{from:.3}),min({max},1+{rate}*(it-{from:.3})),1)':d=1:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={size}:fps={fps}",
        from = from_secs,
        max = KEN_BURNS_MAX,
        rate = FREEZE_ZOOM_PER_SEC,
        size = target.as_ffmpeg_size(),
        fps = fps
    )
}

/// Hold the last frame for `pad_secs` more seconds.
pub fn freeze_last_frame(pad_secs: f64) -> String {
    format!("tpad=stop_mode=clone:stop_duration={:.3}", pad_secs)
}

/// Cut video to `[0, secs)` and reset timestamps.
pub fn trim_video(secs: f64) -> String {
    format!("trim=duration={:.3},setpts=PTS-STARTPTS", secs)
}

/// Cut audio to `[0, secs)` and reset timestamps.
pub fn trim_audio(secs: f64) -> String {
    format!("atrim=duration={:.3},asetpts=PTS-STARTPTS", secs)
}

/// Pad audio with silence, then cut to exactly `secs`.
pub fn fit_audio(secs: f64) -> String {
    format!("apad,{}", trim_audio(secs))
}

/// Normalize audio to the shared sample format so tracks can be concatenated.
pub fn audio_format(sample_rate: u32) -> String {
    format!("aformat=sample_rates={}:channel_layouts=stereo", sample_rate)
}

/// Burn an ASS subtitle file.
pub fn burn_subtitles(path: &Path) -> String {
    format!("ass=filename='{}'", escape_filter_path(path))
}

/// Attenuate music to `MUSIC_VOLUME`.
pub fn music_gain() -> String {
    format!("volume={}", MUSIC_VOLUME)
}

/// Mix two audio streams additively, keeping the first stream's length.
pub fn mix_under(first: &str, second: &str, out: &str) -> String {
    format!(
        "[{}][{}]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[{}]",
        first, second, out
    )
}

/// Concatenate `n` segments of one video and one audio stream each.
pub fn concat(labels: &[(String, String)], video_out: &str, audio_out: &str) -> String {
    let mut filter = String::new();
    for (v, a) in labels {
        filter.push_str(&format!("[{}][{}]", v, a));
    }
    filter.push_str(&format!(
        "concat=n={}:v=1:a=1[{}][{}]",
        labels.len(),
        video_out,
        audio_out
    ));
    filter
}

/// Escape a path for use inside a quoted filter option.
fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("'\\''"),
            ':' => out.push_str("\\:"),
            _ => out.push(c),
        }
    }
    out
}
