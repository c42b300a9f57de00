//! Final MP4 encode of an assembled timeline.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::info;

use reel_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::timeline::Timeline;

/// An encoded video on scratch storage.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub duration: f64,
    pub size_bytes: u64,
}

/// Build the final encode command (H.264 + AAC in MP4, faststart).
pub fn encode_command(timeline: &Timeline, output: &Path, encoding: &EncodingConfig) -> FfmpegCommand {
    timeline
        .to_command(output)
        .output_args(encoding.to_ffmpeg_args())
        .faststart()
}

/// Encode `timeline` to `output`, reporting percent complete.
pub async fn encode_timeline<F>(
    timeline: &Timeline,
    output: &Path,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
    on_progress: F,
) -> MediaResult<EncodedVideo>
where
    F: Fn(f64) + Send + 'static,
{
    let started = Instant::now();
    let total = timeline.duration;
    let cmd = encode_command(timeline, output, encoding);

    runner
        .run_with_progress(&cmd, move |p| on_progress(p.percentage(total)))
        .await?;

    let size_bytes = match fs::metadata(output).await {
        Ok(meta) => meta.len(),
        Err(_) => return Err(MediaError::FileNotFound(output.to_path_buf())),
    };
    if size_bytes == 0 {
        return Err(MediaError::InvalidMedia("Encoder produced an empty file".to_string()));
    }

    info!(
        output = %output.display(),
        duration = total,
        size_bytes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Timeline encoded"
    );

    Ok(EncodedVideo {
        path: output.to_path_buf(),
        duration: total,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ComposedTrack;
    use crate::timeline::assemble;

    #[test]
    fn test_encode_command_args() {
        let tracks = vec![ComposedTrack {
            index: 0,
            path: PathBuf::from("/s/scene_0.mp4"),
            duration: 5.0,
        }];
        let timeline = assemble(&tracks, None).unwrap();
        let args = encode_command(&timeline, Path::new("/s/final.mp4"), &EncodingConfig::default()).build_args();

        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(args.contains(&"veryfast".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&"[vout]".to_string()));
        assert_eq!(args.last().unwrap(), "/s/final.mp4");
    }
}
