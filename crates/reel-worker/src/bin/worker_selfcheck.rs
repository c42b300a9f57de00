use std::path::Path;

use reel_media::{check_ffmpeg, check_ffprobe};
use reel_queue::JobStore;
use reel_storage::StorageConfig;
use reel_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    println!("worker-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    let queue = JobStore::from_env();
    let stats = queue.stats().await?;
    println!(
        "worker-selfcheck: queue {} ({} jobs, {} pending)",
        queue.path().display(),
        stats.total(),
        stats.pending
    );

    let store = StorageConfig::from_env()?.connect().await?;
    store.check().await?;
    println!("worker-selfcheck: {} storage reachable", store.backend_name());

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
