//! Queue file contents.
//!
//! The file is shared with other producers, so only `render_video` records
//! are decoded. Every other entry, and any render record that fails to
//! decode, is carried as its original JSON text and written back unchanged.

use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::warn;

use reel_models::{Job, JobType};

use crate::error::{QueueError, QueueResult};

/// One entry of the queue file.
#[derive(Debug)]
enum Record {
    Render(Job),
    Opaque { id: Option<String>, raw: Box<RawValue> },
}

/// The fields every producer is expected to write.
#[derive(Debug, Default, Deserialize)]
struct RecordHeader {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    job_type: Option<String>,
}

impl Record {
    fn decode(raw: Box<RawValue>) -> Self {
        let header: RecordHeader = serde_json::from_str(raw.get()).unwrap_or_default();
        let is_render = header
            .job_type
            .as_deref()
            .map_or(true, |t| t == JobType::RenderVideo.as_str());

        if is_render {
            match serde_json::from_str::<Job>(raw.get()) {
                Ok(job) => return Record::Render(job),
                Err(e) => warn!(
                    job_id = header.id.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "Skipping unreadable render record"
                ),
            }
        }

        Record::Opaque { id: header.id, raw }
    }

    fn id(&self) -> Option<&str> {
        match self {
            Record::Render(job) => Some(job.id.as_str()),
            Record::Opaque { id, .. } => id.as_deref(),
        }
    }
}

/// Every record in the queue file, in file order.
#[derive(Debug, Default)]
pub(crate) struct JobList {
    records: Vec<Record>,
}

impl JobList {
    /// Parse the file body. Only a body that is not a JSON array is an error.
    pub(crate) fn parse(body: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<Box<RawValue>> = serde_json::from_str(body)?;
        Ok(Self {
            records: entries.into_iter().map(Record::decode).collect(),
        })
    }

    /// Serialize for the queue file.
    pub(crate) fn to_json(&self) -> QueueResult<Vec<u8>> {
        let mut entries: Vec<Box<RawValue>> = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let entry = match record {
                Record::Render(job) => serde_json::value::to_raw_value(job)
                    .map_err(|e| QueueError::write_conflict(format!("serialize {}: {}", job.id, e)))?,
                Record::Opaque { raw, .. } => raw.clone(),
            };
            entries.push(entry);
        }
        serde_json::to_vec_pretty(&entries).map_err(|e| QueueError::write_conflict(format!("serialize: {}", e)))
    }

    /// Decoded render jobs.
    pub(crate) fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.records.iter().filter_map(|r| match r {
            Record::Render(job) => Some(job),
            Record::Opaque { .. } => None,
        })
    }

    pub(crate) fn jobs_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.records.iter_mut().filter_map(|r| match r {
            Record::Render(job) => Some(job),
            Record::Opaque { .. } => None,
        })
    }

    pub(crate) fn into_jobs(self) -> impl Iterator<Item = Job> {
        self.records.into_iter().filter_map(|r| match r {
            Record::Render(job) => Some(job),
            Record::Opaque { .. } => None,
        })
    }

    /// Whether any record, decoded or not, uses `id`.
    pub(crate) fn contains_id(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id() == Some(id))
    }

    pub(crate) fn push(&mut self, job: Job) {
        self.records.push(Record::Render(job));
    }

    /// Number of records of any type.
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{RenderSpec, Scene};

    const FOREIGN: &str = r#"{"id":"f1","type":"sync-drive","status":"pending","payload":{"folderId":"x"}}"#;
    const BROKEN: &str = r#"{"id":"b1","type":"render_video","status":"pending","payload":{"scenes":[]}}"#;

    #[test]
    fn test_foreign_and_broken_records_are_opaque() {
        let good = serde_json::to_string(&Job::new(
            "g1",
            RenderSpec::new("p", vec![Scene::default().with_duration(1.0)]),
        ))
        .unwrap();
        let body = format!("[{},{},{}]", FOREIGN, BROKEN, good);

        let list = JobList::parse(&body).unwrap();
        assert_eq!(list.len(), 3);
        let ids: Vec<&str> = list.jobs().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["g1"]);
        assert!(list.contains_id("f1"));
        assert!(list.contains_id("b1"));

        let written = String::from_utf8(list.to_json().unwrap()).unwrap();
        assert!(written.contains(FOREIGN));
        assert!(written.contains(BROKEN));
    }

    #[test]
    fn test_record_without_type_is_a_render_job() {
        let body = r#"[{"id":"old","status":"pending","payload":{"projectId":"p","scenes":[{"duration":2}]}}]"#;
        let list = JobList::parse(body).unwrap();
        let job = list.jobs().next().unwrap();
        assert_eq!(job.job_type, JobType::RenderVideo);
    }

    #[test]
    fn test_non_array_body_is_an_error() {
        assert!(JobList::parse(r#"{"id":"x"}"#).is_err());
        assert!(JobList::parse("[{oops").is_err());
    }
}
