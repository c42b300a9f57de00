//! Render orchestration.
//!
//! Drives one render spec through fetch, per-scene composition, timeline
//! assembly, the final encode, and publishing. Progress checkpoints:
//!
//! | Stage                   | Percent   |
//! |-------------------------|-----------|
//! | assets fetched          | 5         |
//! | each scene composed     | 5..=70    |
//! | all scenes done         | 75        |
//! | encoding                | 80..95    |
//! | uploading               | 95        |
//! | published               | 100       |

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use reel_media::{
    assemble, compose_scene, encode_timeline, prepare_assets, prepare_music, AssetFetcher, ComposeConfig,
    ComposedTrack, FfmpegRunner, MusicTrack, SceneAssets, ScenePlan,
};
use reel_models::{JobId, RenderSpec};
use reel_storage::{publish_render, BlobStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Progress callback, called with a percentage in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A progress callback that discards every update.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// A finished, published render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// Public URL of the published MP4
    pub url: String,
    /// Storage key under `renders/`
    pub key: String,
    /// Timeline duration in seconds
    pub duration: f64,
    /// Scenes that made it into the video
    pub scenes_rendered: usize,
    /// Scenes dropped after a composition failure
    pub scenes_dropped: usize,
}

/// Turns a render spec into a published video.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, job_id: &JobId, spec: &RenderSpec, progress: ProgressFn) -> WorkerResult<RenderOutput>;
}

/// Percent reached after `done` of `total` scenes.
pub fn scene_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 70;
    }
    let done = done.min(total) as f64;
    (5.0 + 65.0 * done / total as f64).round() as u8
}

/// Map encoder percent into the 80..95 band.
fn encode_progress(percent: f64) -> u8 {
    (80.0 + 15.0 * percent.clamp(0.0, 100.0) / 100.0).floor().min(94.0) as u8
}

/// FFmpeg/storage backed renderer.
pub struct RenderPipeline {
    config: WorkerConfig,
    compose: ComposeConfig,
    fetcher: AssetFetcher,
    runner: FfmpegRunner,
    store: Arc<dyn BlobStore>,
    encode_permits: Arc<Semaphore>,
}

impl RenderPipeline {
    /// Create a pipeline.
    ///
    /// `encode_permits` bounds concurrent FFmpeg encodes; share it across
    /// every pipeline in the process.
    pub fn new(
        config: WorkerConfig,
        compose: ComposeConfig,
        store: Arc<dyn BlobStore>,
        encode_permits: Arc<Semaphore>,
    ) -> WorkerResult<Self> {
        let fetcher = AssetFetcher::new(config.asset_timeout)?;
        let runner = FfmpegRunner::new().with_optional_timeout(config.ffmpeg_timeout_secs);

        Ok(Self {
            config,
            compose,
            fetcher,
            runner,
            store,
            encode_permits,
        })
    }

    /// Storage backend renders are published to.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    async fn render_in(
        &self,
        job_id: &JobId,
        spec: &RenderSpec,
        progress: &ProgressFn,
        scratch: &Path,
    ) -> WorkerResult<RenderOutput> {
        let (assets, music) = tokio::join!(
            self.prefetch_scenes(spec, scratch),
            self.prefetch_music(spec, scratch)
        );
        progress(5);

        let total = spec.scenes.len();
        let mut tracks: Vec<ComposedTrack> = Vec::with_capacity(total);
        for (scene, assets) in spec.scenes.iter().zip(assets) {
            let index = assets.index;
            let plan = ScenePlan::plan(scene, assets, &self.compose);

            match self.compose(&plan, scratch).await {
                Ok(track) => tracks.push(track),
                Err(e) => {
                    metrics::record_scene_dropped();
                    warn!(job_id = %job_id, scene = index, error = %e, "Scene dropped");
                }
            }
            progress(scene_progress(index + 1, total));
        }
        let scenes_dropped = total - tracks.len();
        progress(75);

        let timeline = assemble(&tracks, music.as_ref())?;
        info!(
            job_id = %job_id,
            scenes = timeline.scene_count,
            dropped = scenes_dropped,
            duration = timeline.duration,
            music = timeline.has_music,
            "Timeline assembled"
        );

        progress(80);
        let output = scratch.join("render.mp4");
        let encode_started = Instant::now();
        let encoded = {
            let _permit = self.acquire_encode().await?;
            let on_encode = Arc::clone(progress);
            let last = Arc::new(AtomicU8::new(80));
            encode_timeline(&timeline, &output, &self.compose.encoding, &self.runner, move |pct| {
                let next = encode_progress(pct);
                if next > last.fetch_max(next, Ordering::Relaxed) {
                    on_encode(next);
                }
            })
            .await?
        };
        metrics::record_encode_duration(encode_started.elapsed().as_secs_f64());

        progress(95);
        let upload_started = Instant::now();
        let published = publish_render(self.store.as_ref(), &encoded.path, &spec.project_id).await?;
        metrics::record_upload_duration(upload_started.elapsed().as_secs_f64());

        progress(100);
        Ok(RenderOutput {
            url: published.url,
            key: published.key,
            duration: encoded.duration,
            scenes_rendered: tracks.len(),
            scenes_dropped,
        })
    }

    /// Fetch every scene's assets with bounded parallelism, in scene order.
    async fn prefetch_scenes(&self, spec: &RenderSpec, scratch: &Path) -> Vec<SceneAssets> {
        let parallel = self.config.max_download_parallel.max(1);
        let fetches: Vec<_> = spec
            .scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| prepare_assets(&self.fetcher, scene, index, scratch))
            .collect();
        stream::iter(fetches)
            .buffered(parallel)
            .collect()
            .await
    }

    async fn prefetch_music(&self, spec: &RenderSpec, scratch: &Path) -> Option<MusicTrack> {
        match spec.bg_music_url.as_deref() {
            Some(url) => prepare_music(&self.fetcher, url, scratch).await,
            None => None,
        }
    }

    async fn compose(&self, plan: &ScenePlan, scratch: &Path) -> WorkerResult<ComposedTrack> {
        let _permit = self.acquire_encode().await?;
        Ok(compose_scene(plan, &self.compose, &self.runner, scratch).await?)
    }

    async fn acquire_encode(&self) -> WorkerResult<tokio::sync::SemaphorePermit<'_>> {
        self.encode_permits
            .acquire()
            .await
            .map_err(|_| WorkerError::render_failed("Encode semaphore closed"))
    }
}

#[async_trait]
impl Renderer for RenderPipeline {
    async fn render(&self, job_id: &JobId, spec: &RenderSpec, progress: ProgressFn) -> WorkerResult<RenderOutput> {
        spec.validate().map_err(WorkerError::invalid_spec)?;

        let started = Instant::now();
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("render-")
            .tempdir_in(&self.config.work_dir)?;
        debug!(job_id = %job_id, dir = %scratch.path().display(), "Scratch directory created");

        let result = self.render_in(job_id, spec, &progress, scratch.path()).await;

        if let Err(e) = scratch.close() {
            warn!(job_id = %job_id, error = %e, "Failed to remove scratch directory");
        }
        metrics::record_render_duration(started.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::Scene;
    use reel_storage::LocalDirStore;
    use std::sync::Mutex;

    #[test]
    fn test_scene_progress_band() {
        assert_eq!(scene_progress(0, 4), 5);
        assert_eq!(scene_progress(2, 4), 38);
        assert_eq!(scene_progress(4, 4), 70);
        assert_eq!(scene_progress(9, 4), 70);
        assert_eq!(scene_progress(1, 1), 70);
    }

    #[test]
    fn test_encode_progress_band() {
        assert_eq!(encode_progress(0.0), 80);
        assert_eq!(encode_progress(50.0), 87);
        assert_eq!(encode_progress(100.0), 94);
        assert_eq!(encode_progress(250.0), 94);
    }

    async fn pipeline(work_dir: &Path) -> RenderPipeline {
        let store = LocalDirStore::new(work_dir.join("published"), "http://files.local")
            .await
            .unwrap();
        let config = WorkerConfig {
            work_dir: work_dir.join("scratch"),
            ..Default::default()
        };
        RenderPipeline::new(config, ComposeConfig::default(), Arc::new(store), Arc::new(Semaphore::new(1))).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_spec_fails_before_work() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let spec = RenderSpec::new("proj", Vec::new());
        let err = pipeline
            .render(&JobId::from("j"), &spec, Arc::new(move |p| sink.lock().unwrap().push(p)))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::InvalidSpec(_)));
        assert!(seen.lock().unwrap().is_empty());
        assert!(!dir.path().join("scratch").exists());
    }

    #[tokio::test]
    async fn test_scratch_removed_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;

        // Unreachable asset degrades to a black frame; without ffmpeg the
        // compose fails and the render ends with no valid scenes. With ffmpeg
        // it succeeds. Either way the scratch directory must be gone.
        let spec = RenderSpec::new(
            "proj",
            vec![Scene::default().with_image("http://127.0.0.1:9/a.png").with_duration(1.0)],
        );
        let _ = pipeline.render(&JobId::from("j"), &spec, no_progress()).await;

        let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
