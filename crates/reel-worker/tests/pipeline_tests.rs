//! End-to-end render through the queue, FFmpeg, and a local store.
//!
//! Run with: cargo test -p reel-worker -- --ignored

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::process::Command;
use tokio::sync::Semaphore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reel_media::{probe_media, ComposeConfig};
use reel_models::{Job, JobStatus, RenderSpec, Scene};
use reel_queue::{JobStore, QueueConfig};
use reel_storage::LocalDirStore;
use reel_worker::{
    JobExecutor, JobHandler, PollOutcome, RenderPipeline, WebhookConfig, WebhookNotifier, WorkerConfig,
};

async fn lavfi(dir: &Path, name: &str, source: &str, extra: &[&str]) -> PathBuf {
    let out = dir.join(name);
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i", source])
        .args(extra)
        .arg(&out)
        .status()
        .await
        .expect("ffmpeg spawn");
    assert!(status.success(), "failed to generate {}", name);
    out
}

async fn serve(server: &MockServer, route: &str, file: &Path, content_type: &str) {
    let bytes = std::fs::read(file).unwrap();
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes, content_type))
        .mount(server)
        .await;
}

struct Harness {
    dir: tempfile::TempDir,
    store: JobStore,
    executor: JobExecutor,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let published = LocalDirStore::new(dir.path().join("published"), "http://files.local")
        .await
        .unwrap();
    let config = WorkerConfig {
        work_dir: dir.path().join("scratch"),
        ..Default::default()
    };
    let pipeline = RenderPipeline::new(
        config.clone(),
        ComposeConfig::default(),
        Arc::new(published),
        Arc::new(Semaphore::new(1)),
    )
    .unwrap();

    let store = JobStore::new(QueueConfig::at(dir.path().join("jobs.json")));
    let webhooks = WebhookNotifier::new(&WebhookConfig::default()).unwrap();
    let handler = JobHandler::new(store.clone(), Arc::new(pipeline), webhooks);

    Harness {
        executor: JobExecutor::new(config, handler),
        store,
        dir,
    }
}

fn published_path(dir: &Path, url: &str) -> PathBuf {
    let key = url.trim_start_matches("http://files.local/");
    dir.join("published").join(key)
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn image_and_video_scenes_render_to_published_mp4() {
    let h = harness().await;
    let assets = tempfile::tempdir().unwrap();
    let image = lavfi(assets.path(), "a.png", "testsrc=s=1280x720", &["-frames:v", "1"]).await;
    let clip = lavfi(
        assets.path(),
        "b.mp4",
        "testsrc=s=640x480:r=30:d=1",
        &["-pix_fmt", "yuv420p"],
    )
    .await;
    let narration = lavfi(assets.path(), "n.wav", "sine=frequency=440:duration=2", &[]).await;

    let server = MockServer::start().await;
    serve(&server, "/a.png", &image, "image/png").await;
    serve(&server, "/b.mp4", &clip, "video/mp4").await;
    serve(&server, "/n.wav", &narration, "audio/wav").await;

    let spec = RenderSpec::new(
        "demo project",
        vec![
            Scene::default()
                .with_image(format!("{}/a.png", server.uri()))
                .with_duration(2.0),
            Scene::default()
                .with_video(format!("{}/b.mp4", server.uri()))
                .with_audio(format!("{}/n.wav", server.uri())),
        ],
    );
    h.store.enqueue(Job::new("e2e-1", spec)).await.unwrap();

    let outcome = h.executor.poll_once().await;
    assert!(matches!(outcome, PollOutcome::Handled(_, JobStatus::Completed)));

    let job = h.store.get("e2e-1").await.unwrap().unwrap();
    let url = job.result_url.expect("result url");
    assert!(url.starts_with("http://files.local/renders/render_demo_project_"));

    let info = probe_media(published_path(h.dir.path(), &url)).await.unwrap();
    assert!((info.duration - 4.0).abs() < 0.2, "duration {}", info.duration);
    assert_eq!((info.width, info.height), (1080, 1920));
    assert!(info.has_audio);

    let scratch_left = std::fs::read_dir(h.dir.path().join("scratch")).unwrap().count();
    assert_eq!(scratch_left, 0);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn unreachable_assets_still_render_black_scenes() {
    let h = harness().await;
    let spec = RenderSpec::new(
        "fallbacks",
        vec![Scene::default()
            .with_image("http://127.0.0.1:9/missing.png")
            .with_duration(1.5)],
    );
    h.store.enqueue(Job::new("e2e-2", spec)).await.unwrap();

    let outcome = h.executor.poll_once().await;
    assert!(matches!(outcome, PollOutcome::Handled(_, JobStatus::Completed)));

    let job = h.store.get("e2e-2").await.unwrap().unwrap();
    let info = probe_media(published_path(h.dir.path(), &job.result_url.unwrap()))
        .await
        .unwrap();
    assert!((info.duration - 1.5).abs() < 0.2, "duration {}", info.duration);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn progress_checkpoints_are_monotonic() {
    use reel_worker::Renderer;

    let h = harness().await;
    let pipeline = RenderPipeline::new(
        WorkerConfig {
            work_dir: h.dir.path().join("scratch2"),
            ..Default::default()
        },
        ComposeConfig::default(),
        Arc::new(
            LocalDirStore::new(h.dir.path().join("published"), "http://files.local")
                .await
                .unwrap(),
        ),
        Arc::new(Semaphore::new(1)),
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let spec = RenderSpec::new(
        "progress",
        vec![Scene::default().with_duration(1.0), Scene::default().with_duration(1.0)],
    );
    pipeline
        .render(&"p-1".into(), &spec, Arc::new(move |p| sink.lock().unwrap().push(p)))
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&5));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    for checkpoint in [70, 75, 80, 95] {
        assert!(seen.contains(&checkpoint), "missing {} in {:?}", checkpoint, seen);
    }
}
