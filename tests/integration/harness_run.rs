//! Full benchmark runs over in-memory adapters

use async_trait::async_trait;
use encoding_bench::adapter::{AdapterError, AdapterResult, EncodeParams, EncodingAdapter, StorageAdapter};
use encoding_bench::harness::{self, Bitrates, Harness, HarnessError, RunSettings};
use encoding_bench::jobs::{JobStatus, JobStatusSource, OutputSpec};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type Objects = Arc<Mutex<BTreeMap<String, u64>>>;

/// Object store backed by a shared map
struct MemoryStore {
    objects: Objects,
    /// HEAD requests under this prefix are rejected
    unsized_prefix: Option<&'static str>,
}

impl MemoryStore {
    fn new(objects: &Objects) -> Self {
        Self {
            objects: objects.clone(),
            unsized_prefix: None,
        }
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    fn api(&self) -> &'static str {
        "s3"
    }
    fn region(&self) -> &str {
        "us-east-1"
    }
    fn container(&self) -> &str {
        "media"
    }
    async fn authenticate(&self) -> bool {
        true
    }
    async fn container_exists(&self, container: &str) -> AdapterResult<bool> {
        Ok(container == "media")
    }
    async fn delete_object(&self, _container: &str, object: &str) -> AdapterResult<bool> {
        Ok(self.objects.lock().unwrap().remove(object).is_some())
    }
    async fn object_size(&self, _container: &str, object: &str) -> AdapterResult<Option<u64>> {
        if self.unsized_prefix.is_some_and(|p| object.starts_with(p)) {
            return Err(AdapterError::Status {
                operation: format!("HEAD {}", object),
                status: 403,
            });
        }
        Ok(self.objects.lock().unwrap().get(object).copied())
    }
    async fn list_container(&self, _container: &str, prefix: Option<&str>) -> AdapterResult<Vec<String>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
            .cloned()
            .collect())
    }
    async fn object_exists(&self, _container: &str, object: &str) -> AdapterResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(object))
    }
    fn object_url(&self, object: &str) -> String {
        format!("mem://media/{}", object)
    }
}

/// Encoder that writes half-size outputs and reports a fixed status sequence
struct MemoryEncoder {
    objects: Objects,
    reject: Option<&'static str>,
    polls: Mutex<usize>,
    submitted: Mutex<Vec<(String, Vec<OutputSpec>)>>,
}

impl MemoryEncoder {
    fn new(objects: Objects) -> Self {
        Self {
            objects,
            reject: None,
            polls: Mutex::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl JobStatusSource for MemoryEncoder {
    async fn job_status(&self, job_ids: &[String]) -> Option<HashMap<String, String>> {
        let mut polls = self.polls.lock().unwrap();
        *polls += 1;
        let status = match *polls {
            1 => "queue",
            2 => "encode",
            _ => "success",
        };
        Some(job_ids.iter().map(|id| (id.clone(), status.to_string())).collect())
    }
}

#[async_trait]
impl EncodingAdapter for MemoryEncoder {
    fn name(&self) -> &'static str {
        "memory"
    }
    async fn init(&mut self) -> AdapterResult<()> {
        Ok(())
    }
    async fn authenticate(&self) -> bool {
        true
    }
    async fn encode(
        &self,
        _storage: &dyn StorageAdapter,
        input: &str,
        outputs: &[OutputSpec],
        _params: &EncodeParams,
    ) -> AdapterResult<String> {
        if self.reject == Some(input) {
            return Err(AdapterError::Status {
                operation: "POST /jobs".to_string(),
                status: 400,
            });
        }
        let mut objects = self.objects.lock().unwrap();
        let size = objects.get(input).copied().unwrap_or_default() / 2;
        for output in outputs {
            objects.insert(output.name.clone(), size);
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((input.to_string(), outputs.to_vec()));
        Ok(format!("job-{}", submitted.len()))
    }
    async fn job_stats(&self, _job_id: &str) -> Option<BTreeMap<String, Value>> {
        let mut stats = BTreeMap::new();
        stats.insert("output_success".to_string(), json!(1));
        stats.insert("output_durations".to_string(), json!("60"));
        Some(stats)
    }
    fn same_region(&self, storage: &dyn StorageAdapter) -> bool {
        storage.region() == "us-east-1"
    }
}

fn store(objects: &[(&str, u64)]) -> Objects {
    Arc::new(Mutex::new(
        objects.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    ))
}

fn settings(input: &str) -> RunSettings {
    RunSettings {
        input: input.to_string(),
        format: "_default_".to_string(),
        bitrates: Bitrates {
            audio: Some(128),
            video: None,
        },
    }
}

fn bench(objects: &Objects, encoder: MemoryEncoder, input: &str, dir: &TempDir) -> Harness {
    bench_with(MemoryStore::new(objects), encoder, input, dir)
}

fn bench_with(storage: MemoryStore, encoder: MemoryEncoder, input: &str, dir: &TempDir) -> Harness {
    Harness::new(
        Box::new(encoder),
        Box::new(storage),
        settings(input),
        dir.path().join(".output_objects"),
    )
    .with_timing(Duration::ZERO, Duration::ZERO)
}

#[tokio::test]
async fn test_run_reports_and_records_outputs() {
    let dir = TempDir::new().unwrap();
    let objects = store(&[
        ("videos/", 0),
        ("videos/a.mp4", 4 * 1024 * 1024),
        ("videos/song.MP3", 1024 * 1024),
        ("videos/readme.txt", 10),
    ]);

    let mut run = bench(&objects, MemoryEncoder::new(objects.clone()), "videos/*.mp*", &dir);
    let report = run.run().await.unwrap();

    assert_eq!(report.jobs.len(), 2);
    assert!(report.all_succeeded());
    assert!(report.same_region);

    let audio = report.jobs.iter().find(|j| j.input == "videos/song.MP3").unwrap();
    assert_eq!(audio.outputs.len(), 1);
    assert!(audio.outputs[0].name.ends_with("/song_a128_1.aac"));
    assert_eq!(audio.outputs[0].video_bitrate, None);

    let video = report.jobs.iter().find(|j| j.input == "videos/a.mp4").unwrap();
    assert!(video.outputs[0].name.ends_with("/a_a128_v-def_1.mp4"));
    assert_eq!(video.output_files.len(), 1);
    assert_eq!(video.output_size, Some(2 * 1024 * 1024));
    assert_eq!(video.status, JobStatus::Success);
    let states: Vec<JobStatus> = video.history().iter().map(|(s, _)| *s).collect();
    assert_eq!(
        states,
        vec![JobStatus::Download, JobStatus::Queue, JobStatus::Encode, JobStatus::Success]
    );
    assert!(video.time_in(JobStatus::Encode).is_some());

    let text = report.to_results_block();
    assert!(text.starts_with("\n\n[results]\n"));
    assert!(text.contains("job_status1=success\n"));
    assert!(text.contains("size_ratio1=50\n") || text.contains("size_ratio2=50\n"));
    assert!(text.contains("output_minutes1=1\n"));

    let recorded = std::fs::read_to_string(dir.path().join(".output_objects")).unwrap();
    let recorded: Vec<&str> = recorded.lines().collect();
    assert_eq!(recorded.len(), 2);
    assert!(recorded.iter().all(|name| name.starts_with("ch")));

    let encoder = MemoryEncoder::new(objects.clone());
    let storage = MemoryStore::new(&objects);
    let cleaned = harness::cleanup(&encoder, &storage, &dir.path().join(".output_objects"))
        .await
        .unwrap();
    assert!(cleaned);
    assert_eq!(objects.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_unsizable_outputs_keep_the_report() {
    let dir = TempDir::new().unwrap();
    let objects = store(&[("a.mp4", 100)]);
    let mut storage = MemoryStore::new(&objects);
    storage.unsized_prefix = Some("ch");

    let mut run = bench_with(storage, MemoryEncoder::new(objects.clone()), "a.mp4", &dir);
    let report = run.run().await.unwrap();

    let job = &report.jobs[0];
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.output_files.len(), 1);
    assert_eq!(job.output_size, None);
    let text = report.to_results_block();
    assert!(text.contains("output_files=1\n"));
    assert!(!text.contains("size_ratio"));

    let recorded = std::fs::read_to_string(dir.path().join(".output_objects")).unwrap();
    assert_eq!(recorded.lines().count(), 1);
}

#[tokio::test]
async fn test_failed_submission_is_skipped() {
    let dir = TempDir::new().unwrap();
    let objects = store(&[("a.mp4", 100), ("b.mp4", 100)]);
    let mut encoder = MemoryEncoder::new(objects.clone());
    encoder.reject = Some("a.mp4");

    let mut run = bench(&objects, encoder, "*.mp4", &dir);
    let report = run.run().await.unwrap();

    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.jobs[0].input, "b.mp4");
    assert!(report.to_results_block().contains("\njob_id=job-1\n"));
}

#[tokio::test]
async fn test_no_matching_inputs() {
    let dir = TempDir::new().unwrap();
    let objects = store(&[("a.mov", 100)]);

    let mut run = bench(&objects, MemoryEncoder::new(objects.clone()), "*.mp4", &dir);
    assert!(matches!(run.run().await, Err(HarnessError::NoInputs(_))));
}

#[tokio::test]
async fn test_empty_input_is_rejected() {
    let dir = TempDir::new().unwrap();
    let objects = store(&[("a.mp4", 0)]);

    let mut run = bench(&objects, MemoryEncoder::new(objects.clone()), "a.mp4", &dir);
    assert!(matches!(run.run().await, Err(HarnessError::UnknownSize(name)) if name == "a.mp4"));
}

#[tokio::test]
async fn test_every_submission_failing_aborts() {
    let dir = TempDir::new().unwrap();
    let objects = store(&[("a.mp4", 100)]);
    let mut encoder = MemoryEncoder::new(objects.clone());
    encoder.reject = Some("a.mp4");

    let mut run = bench(&objects, encoder, "a.mp4", &dir);
    assert!(matches!(run.run().await, Err(HarnessError::NoJobsStarted)));
}

#[tokio::test]
async fn test_cleanup_without_file_fails() {
    let dir = TempDir::new().unwrap();
    let objects = store(&[]);
    let encoder = MemoryEncoder::new(objects.clone());
    let storage = MemoryStore::new(&objects);

    let cleaned = harness::cleanup(&encoder, &storage, &dir.path().join("missing"))
        .await
        .unwrap();
    assert!(!cleaned);
}

#[tokio::test]
async fn test_cleanup_reports_undeletable_objects() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".output_objects");
    std::fs::write(&path, "ch1/a.mp4\nch1/gone.mp4\n\n").unwrap();
    let objects = store(&[("ch1/a.mp4", 1)]);
    let encoder = MemoryEncoder::new(objects.clone());
    let storage = MemoryStore::new(&objects);

    assert!(!harness::cleanup(&encoder, &storage, &path).await.unwrap());
    assert!(objects.lock().unwrap().is_empty());
}
