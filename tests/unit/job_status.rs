//! Canonical status vocabulary and job timing

use chrono::{DateTime, TimeZone, Utc};
use encoding_bench::jobs::{Job, JobStatus, OutputState};
use std::time::Duration;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
}

fn job(initial: JobStatus) -> Job {
    Job::new("job-1", "clip.mp4", 1024, Vec::new(), "ch1", initial, at(0))
}

#[test]
fn test_terminal_status_from_output_counts() {
    assert_eq!(JobStatus::from_output_counts(2, 0), JobStatus::Success);
    assert_eq!(JobStatus::from_output_counts(1, 1), JobStatus::Partial);
    assert_eq!(JobStatus::from_output_counts(0, 3), JobStatus::Fail);
    assert_eq!(JobStatus::from_output_counts(0, 0), JobStatus::Fail);
}

#[test]
fn test_status_from_output_states() {
    use OutputState::*;
    assert_eq!(JobStatus::from_output_states(&[Complete, Encoding, Queued]), JobStatus::Encode);
    assert_eq!(JobStatus::from_output_states(&[Complete, Queued]), JobStatus::Queue);
    assert_eq!(JobStatus::from_output_states(&[Complete, Failed]), JobStatus::Partial);
    assert_eq!(JobStatus::from_output_states(&[Complete]), JobStatus::Success);
}

#[test]
fn test_unknown_status_is_rejected() {
    assert!("encoding".parse::<JobStatus>().is_err());
    assert!("SUCCESS".parse::<JobStatus>().is_err());
    assert_eq!("upload".parse::<JobStatus>(), Ok(JobStatus::Upload));
}

#[test]
fn test_skipped_states_have_no_time() {
    let mut job = job(JobStatus::Download);
    assert!(job.advance(JobStatus::Encode, at(5)));
    assert!(job.advance(JobStatus::Success, at(12)));

    assert_eq!(job.time_in(JobStatus::Download), Some(Duration::from_secs(5)));
    assert_eq!(job.time_in(JobStatus::Encode), Some(Duration::from_secs(7)));
    assert_eq!(job.time_in(JobStatus::Queue), None);
    assert_eq!(job.total_time(), Some(Duration::from_secs(12)));
}

#[test]
fn test_regression_and_revisit_are_ignored() {
    let mut job = job(JobStatus::Queue);
    assert!(job.advance(JobStatus::Upload, at(3)));
    assert!(!job.advance(JobStatus::Encode, at(4)));
    assert!(!job.advance(JobStatus::Queue, at(5)));
    assert_eq!(job.status, JobStatus::Upload);
    assert_eq!(job.history().len(), 2);
}

#[test]
fn test_terminal_job_is_frozen() {
    let mut job = job(JobStatus::Queue);
    assert!(job.advance(JobStatus::Partial, at(2)));
    assert!(!job.advance(JobStatus::Success, at(3)));
    assert!(!job.force_fail(at(4)));
    assert_eq!(job.status, JobStatus::Partial);
    assert_eq!(job.stop, Some(at(2)));
}

#[test]
fn test_force_fail_records_outgoing_state() {
    let mut job = job(JobStatus::Encode);
    assert!(job.force_fail(at(9)));
    assert_eq!(job.status, JobStatus::Fail);
    assert_eq!(job.time_in(JobStatus::Encode), Some(Duration::from_secs(9)));
}
