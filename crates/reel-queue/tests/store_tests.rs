//! Job store behavior against real files.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Utc;
use tempfile::TempDir;

use reel_models::{Job, JobStatus, RenderResult, RenderSpec, Scene};
use reel_queue::{JobStore, QueueConfig, QueueError};

fn spec(project: &str) -> RenderSpec {
    RenderSpec::new(project, vec![Scene::default().with_duration(5.0)])
}

fn job(id: &str) -> Job {
    Job::new(id, spec("proj"))
}

fn setup() -> (TempDir, PathBuf, JobStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.json");
    let store = JobStore::new(QueueConfig::at(&path));
    (dir, path, store)
}

#[tokio::test]
async fn claim_on_missing_file_returns_none() {
    let (_dir, path, store) = setup();
    assert!(store.claim_next_pending().await.unwrap().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn claim_on_blank_file_returns_none() {
    let (_dir, path, store) = setup();
    std::fs::write(&path, "  \n\t ").unwrap();
    assert!(store.claim_next_pending().await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_file_is_unavailable() {
    let (_dir, path, store) = setup();
    std::fs::write(&path, "[{not json").unwrap();

    let err = store.claim_next_pending().await.unwrap_err();
    assert!(matches!(err, QueueError::Unavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn claim_takes_first_pending_render_in_file_order() {
    let (_dir, _path, store) = setup();

    store.enqueue(job("a")).await.unwrap();
    store.enqueue(job("b")).await.unwrap();

    let claimed = store.claim_next_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id.as_str(), "a");
    assert_eq!(claimed.status, JobStatus::Processing);
    assert!(claimed.started_at.is_some());

    // Persisted before returning: a fresh store sees the claim
    let fresh = JobStore::new(QueueConfig::at(store.path()));
    let on_disk = fresh.get("a").await.unwrap().unwrap();
    assert_eq!(on_disk.status, JobStatus::Processing);

    let next = fresh.claim_next_pending().await.unwrap().unwrap();
    assert_eq!(next.id.as_str(), "b");
    assert!(fresh.claim_next_pending().await.unwrap().is_none());
}

const FOREIGN: &str = r#"{"id":"f1","type":"sync-drive","status":"pending","payload":{"folderId":"x"}}"#;

fn good_record(id: &str) -> String {
    serde_json::to_string(&job(id)).unwrap()
}

#[tokio::test]
async fn foreign_records_are_skipped_and_kept_verbatim() {
    let (_dir, path, store) = setup();
    std::fs::write(&path, format!("[{},{}]", FOREIGN, good_record("good"))).unwrap();

    let claimed = store.claim_next_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id.as_str(), "good");
    assert!(store.get("f1").await.unwrap().is_none());

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains(FOREIGN));
    assert_eq!(store.len().await.unwrap(), 2);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.processing, 1);
    assert_eq!(stats.pending, 0);

    // Ids of foreign records are still taken
    let err = store.enqueue(job("f1")).await.unwrap_err();
    assert!(matches!(err, QueueError::DuplicateJob(_)));
}

#[tokio::test]
async fn unreadable_render_record_does_not_block_the_queue() {
    let (_dir, path, store) = setup();
    let broken = r#"{"id":"broken","type":"render_video","status":"pending","payload":{"scenes":[]}}"#;
    std::fs::write(&path, format!("[{},{}]", broken, good_record("next"))).unwrap();

    let claimed = store.claim_next_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id.as_str(), "next");
    assert!(store.claim_next_pending().await.unwrap().is_none());

    store
        .update("next", &RenderResult::completed("https://cdn/n.mp4"), Utc::now())
        .await
        .unwrap();
    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains(broken));
}

#[tokio::test]
async fn concurrent_claims_in_process_are_exclusive() {
    let (_dir, _path, store) = setup();
    for i in 0..10 {
        store.enqueue(job(&format!("job-{}", i))).await.unwrap();
    }

    let tasks: Vec<_> = (0..25)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.claim_next_pending().await.unwrap() })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;
    let claimed: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.unwrap())
        .map(|j| j.id.to_string())
        .collect();

    let unique: HashSet<&String> = claimed.iter().collect();
    assert_eq!(claimed.len(), 10);
    assert_eq!(unique.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_across_store_instances_are_exclusive() {
    let (_dir, path, store) = setup();
    for i in 0..12 {
        store.enqueue(job(&format!("job-{}", i))).await.unwrap();
    }

    // Separate instances share only the file and its lock, like separate processes
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let instance = JobStore::new(QueueConfig::at(&path));
            tokio::spawn(async move {
                let mut mine = Vec::new();
                while let Some(job) = instance.claim_next_pending().await.unwrap() {
                    mine.push(job.id.to_string());
                }
                mine
            })
        })
        .collect();

    let mut all = Vec::new();
    for task in futures::future::join_all(tasks).await {
        all.extend(task.unwrap());
    }

    let unique: HashSet<&String> = all.iter().collect();
    assert_eq!(all.len(), 12);
    assert_eq!(unique.len(), 12);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.processing, 12);
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn update_preserves_jobs_appended_after_claim() {
    let (_dir, path, store) = setup();
    store.enqueue(job("first")).await.unwrap();
    let claimed = store.claim_next_pending().await.unwrap().unwrap();

    // Another front end appends while the render runs
    let other = JobStore::new(QueueConfig::at(&path));
    other.enqueue(job("late")).await.unwrap();

    let updated = store
        .update(claimed.id.as_str(), &RenderResult::completed("https://cdn/x.mp4"), Utc::now())
        .await
        .unwrap();
    assert_eq!(updated.status, JobStatus::Completed);

    let late = store.get("late").await.unwrap().unwrap();
    assert_eq!(late.status, JobStatus::Pending);
    assert_eq!(store.len().await.unwrap(), 2);

    let first = store.get("first").await.unwrap().unwrap();
    assert_eq!(first.result_url.as_deref(), Some("https://cdn/x.mp4"));
    assert!(first.completed_at.is_some());
}

#[tokio::test]
async fn update_unknown_id_is_not_found_and_leaves_file_unchanged() {
    let (_dir, path, store) = setup();
    store.enqueue(job("a")).await.unwrap();
    let before = std::fs::read(&path).unwrap();

    let err = store
        .update("ghost", &RenderResult::failed("boom"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::NotFound(_)));
    assert!(!err.is_retryable());
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn update_requires_processing() {
    let (_dir, _path, store) = setup();
    store.enqueue(job("a")).await.unwrap();

    let err = store
        .update("a", &RenderResult::failed("boom"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidTransition(_)));
    assert_eq!(store.get("a").await.unwrap().unwrap().status, JobStatus::Pending);
}

#[tokio::test]
async fn enqueue_rejects_duplicates() {
    let (_dir, _path, store) = setup();
    store.enqueue(job("a")).await.unwrap();

    let err = store.enqueue(job("a")).await.unwrap_err();
    assert!(matches!(err, QueueError::DuplicateJob(_)));
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn submitted_claimed_job_is_never_polled() {
    let (_dir, _path, store) = setup();

    let submitted = store.submit_claimed(job("direct")).await.unwrap();
    assert_eq!(submitted.status, JobStatus::Processing);
    assert!(store.claim_next_pending().await.unwrap().is_none());

    store
        .update("direct", &RenderResult::failed("No valid scenes"), Utc::now())
        .await
        .unwrap();
    let stored = store.get("direct").await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("No valid scenes"));
}

#[tokio::test]
async fn reads_records_written_by_other_producers() {
    let (_dir, path, store) = setup();
    std::fs::write(
        &path,
        r#"[
  {
    "id": "external-1",
    "type": "render_video",
    "status": "pending",
    "payload": {"projectId": "p1", "scenes": [{"imageUrl": "https://x/a.png", "duration": 4}]},
    "createdAt": "2024-05-01T10:00:00.000Z"
  }
]"#,
    )
    .unwrap();

    let claimed = store.claim_next_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id.as_str(), "external-1");
    assert_eq!(claimed.payload.scenes[0].duration, Some(4.0));
    assert!(!path.with_file_name("jobs.json.lock").exists());
}
