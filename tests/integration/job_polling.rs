//! State machine polling a live status source

use chrono::Utc;
use encoding_bench::adapter::aws::ElasticTranscoder;
use encoding_bench::jobs::{Job, JobError, JobStateMachine, JobStatus, PollOutcome};
use httpmock::prelude::*;
use serde_json::json;

use crate::common::{executor, service_config};

fn queued(id: &str) -> Job {
    Job::new(id, "clip.mp4", 1024, Vec::new(), "ch1", JobStatus::Queue, Utc::now())
}

#[tokio::test]
async fn test_poll_until_complete() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/2012-09-25/jobs/job-a");
            then.status(200).json_body(json!({ "Job": { "Status": "Complete", "Outputs": [
                { "Status": "Complete" }, { "Status": "Error" }
            ]}}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/2012-09-25/jobs/job-b");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/2012-09-25/jobs/job-c");
            then.status(200).json_body(json!({ "Job": { "Id": "job-c" } }));
        })
        .await;

    let aws = ElasticTranscoder::new(service_config(&server.base_url()), executor()).unwrap();
    let mut machine = JobStateMachine::new();
    for id in ["job-a", "job-b", "job-c"] {
        machine.add_job(queued(id)).unwrap();
    }

    assert_eq!(machine.poll(&aws).await.unwrap(), PollOutcome::Complete);
    assert_eq!(machine.job("job-a").unwrap().status, JobStatus::Partial);
    assert_eq!(machine.job("job-b").unwrap().status, JobStatus::Fail);
    assert_eq!(machine.job("job-c").unwrap().status, JobStatus::Fail);
    assert!(machine.pending_ids().is_empty());
}

#[tokio::test]
async fn test_unreachable_service_fails_every_pending_job() {
    let aws = ElasticTranscoder::new(service_config("http://127.0.0.1:9"), executor()).unwrap();
    let mut machine = JobStateMachine::with_max_retries(1);
    machine.add_job(queued("job-a")).unwrap();
    machine.add_job(queued("job-b")).unwrap();

    let err = machine.poll(&aws).await.unwrap_err();
    assert!(matches!(err, JobError::StatusUnavailable { attempts: 2 }));
    assert!(machine.jobs().iter().all(|j| j.status == JobStatus::Fail));
    assert!(machine.jobs().iter().all(|j| j.time_in(JobStatus::Queue).is_some()));
}
