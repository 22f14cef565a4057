//! Domain model for the dashboard and the normalization of raw BigQuery job
//! records into it.
//!
//! `jobs.list` and `jobs.get` return slightly different shapes. Both are read
//! through [`RawJob`] so they normalize through the same code path and yield
//! equal [`Job`] values for the same underlying job.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::BaqmanError;
use crate::structs;
use crate::structs::error_proto::ErrorProto;
use crate::structs::job_configuration::JobConfiguration;
use crate::structs::job_list_item::JobListItem;
use crate::structs::job_statistics::JobStatistics;
use crate::structs::job_status::State;

const TEBIBYTE: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;
const BYTE_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// On-demand query pricing used for the cost estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub usd_per_tib: f64,
}

impl Pricing {
    pub const DEFAULT_USD_PER_TIB: f64 = 5.0;

    pub fn new(usd_per_tib: f64) -> Self {
        Pricing { usd_per_tib }
    }

    /// Estimated cost of scanning `bytes`, e.g. `"$0.00012"`.
    pub fn estimate(&self, bytes: u64) -> String {
        let cost = bytes as f64 / TEBIBYTE * self.usd_per_tib;
        format!("${:.5}", cost)
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Pricing::new(Self::DEFAULT_USD_PER_TIB)
    }
}

/// Takes the job part out of a `"<project>:<jobId>"` identifier.
///
/// Domain-scoped projects (`"example.com:project:jobId"`) contain more than one
/// separator, so the job id is whatever follows the last one.
pub fn extract_job_id(remote_id: &str) -> Result<&str, BaqmanError> {
    match remote_id.rsplit_once(':') {
        Some((project, job_id)) if !project.is_empty() && !job_id.is_empty() => Ok(job_id),
        _ => Err(BaqmanError::MalformedJobId(remote_id.to_string())),
    }
}

/// Renders a byte count with binary units: `0B`, `512B`, `1.5KiB`, `12.3GiB`.
pub fn human_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let mut formatted = format!("{:.1}", value);
    if formatted.ends_with(".0") {
        formatted.truncate(formatted.len() - 2);
    }
    format!("{}{}", formatted, BYTE_UNITS[unit])
}

/// `"4s"`, `"2m 05s"`, `"1h 02m 03s"`.
pub fn format_run_time(run_time: Duration) -> String {
    let total = run_time.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn from_epoch_millis(millis: i64) -> Result<DateTime<Utc>, BaqmanError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(BaqmanError::InvalidTimestamp(millis))
}

/// Read access to the fields the dashboard needs, shared by both raw shapes.
pub trait RawJob {
    fn remote_id(&self) -> Option<&str>;
    fn user_email(&self) -> Option<&str>;
    fn state(&self) -> State;
    fn statistics(&self) -> Option<&JobStatistics>;
    fn configuration(&self) -> Option<&JobConfiguration>;
    fn error_result(&self) -> Option<&ErrorProto>;
}

impl RawJob for structs::job::Job {
    fn remote_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    fn state(&self) -> State {
        self.status
            .as_ref()
            .and_then(|status| status.state)
            .unwrap_or_default()
    }

    fn statistics(&self) -> Option<&JobStatistics> {
        self.statistics.as_ref()
    }

    fn configuration(&self) -> Option<&JobConfiguration> {
        self.configuration.as_ref()
    }

    fn error_result(&self) -> Option<&ErrorProto> {
        self.status
            .as_ref()
            .and_then(|status| status.error_result.as_ref())
    }
}

impl RawJob for JobListItem {
    fn remote_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    fn state(&self) -> State {
        self.status
            .as_ref()
            .and_then(|status| status.state)
            .or(self.state)
            .unwrap_or_default()
    }

    fn statistics(&self) -> Option<&JobStatistics> {
        self.statistics.as_ref()
    }

    fn configuration(&self) -> Option<&JobConfiguration> {
        self.configuration.as_ref()
    }

    fn error_result(&self) -> Option<&ErrorProto> {
        self.status
            .as_ref()
            .and_then(|status| status.error_result.as_ref())
            .or(self.error_result.as_ref())
    }
}

/// A single BigQuery job as shown on the dashboard.
///
/// Run time is not a field: for running jobs it depends on the
/// current time and is computed by [`Job::run_time`] on every read.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub user_name: String,
    pub query: Option<String>,
    pub job_type: Option<String>,
    pub data_queried_bytes: u64,
    pub human_data_queried: String,
    pub query_cost: String,
    pub status: State,
    pub error_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Job {
    pub fn from_raw<R: RawJob + ?Sized>(raw: &R, pricing: &Pricing) -> Result<Job, BaqmanError> {
        let remote_id = raw.remote_id().ok_or(BaqmanError::MissingField("id"))?;
        let id = extract_job_id(remote_id)?.to_string();

        let statistics = raw.statistics();
        let data_queried_bytes = statistics
            .and_then(|s| s.total_bytes_processed)
            .map(|bytes| bytes.max(0) as u64)
            .unwrap_or(0);

        let status = raw.state();
        let start_time = statistics
            .and_then(|s| s.start_time)
            .map(from_epoch_millis)
            .transpose()?;
        let end_time = if status == State::Done {
            statistics
                .and_then(|s| s.end_time)
                .map(from_epoch_millis)
                .transpose()?
        } else {
            None
        };

        let configuration = raw.configuration();
        let query = configuration
            .and_then(|c| c.query.as_ref())
            .and_then(|q| q.query.clone());
        let job_type = configuration.and_then(|c| c.job_type.clone());

        Ok(Job {
            id,
            user_name: raw.user_email().unwrap_or_default().to_string(),
            query,
            job_type,
            data_queried_bytes,
            human_data_queried: human_bytes(data_queried_bytes),
            query_cost: pricing.estimate(data_queried_bytes),
            status,
            error_message: raw.error_result().map(|e| e.message.clone()),
            start_time,
            end_time,
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == State::Running
    }

    /// How long the job ran, or has been running so far.
    pub fn run_time(&self) -> Duration {
        self.run_time_at(Utc::now())
    }

    /// Never negative, even when the remote clock is ahead of ours.
    pub fn run_time_at(&self, now: DateTime<Utc>) -> Duration {
        let Some(start) = self.start_time else {
            return Duration::zero();
        };
        let elapsed = match (self.status, self.end_time) {
            (State::Done, Some(end)) => end - start,
            (State::Done, None) => Duration::zero(),
            _ => now - start,
        };
        elapsed.max(Duration::zero())
    }

    pub fn human_run_time(&self) -> String {
        format_run_time(self.run_time())
    }
}

/// One page of `jobs.list`, split into running and everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPage {
    pub running: Vec<Job>,
    pub done: Vec<Job>,
    /// Empty when there are no more pages.
    pub next_page_token: String,
    /// Records of the page that could not be normalized and are in neither
    /// list.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::job_list::JobList;

    const T0: i64 = 1_650_000_000_000;

    fn list_item(id: &str, state: &str, start: i64, end: Option<i64>, bytes: i64) -> JobListItem {
        let end = end
            .map(|e| format!(r#", "endTime": "{}""#, e))
            .unwrap_or_default();
        let json = format!(
            r#"{{
                "id": "{id}",
                "kind": "bigquery#job",
                "state": "{state}",
                "jobReference": {{"projectId": "proj", "jobId": "{id}", "location": "US"}},
                "statistics": {{
                    "creationTime": "{start}",
                    "startTime": "{start}"{end},
                    "totalBytesProcessed": "{bytes}"
                }},
                "configuration": {{
                    "jobType": "QUERY",
                    "query": {{"query": "select 1", "useLegacySql": false}}
                }},
                "status": {{"state": "{state}"}},
                "user_email": "ops@example.com"
            }}"#,
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn extracts_job_id_after_project_prefix() {
        assert_eq!(extract_job_id("P:J").unwrap(), "J");
        assert_eq!(extract_job_id("proj:US.bquxjob_1").unwrap(), "US.bquxjob_1");
        assert_eq!(
            extract_job_id("example.com:proj:US.job_2").unwrap(),
            "US.job_2"
        );
    }

    #[test]
    fn malformed_job_ids_are_typed_errors() {
        for bad in ["no-separator", "proj:", ":job", ""] {
            match extract_job_id(bad) {
                Err(BaqmanError::MalformedJobId(id)) => assert_eq!(id, bad),
                other => panic!("expected MalformedJobId for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn humanizes_bytes_with_binary_units() {
        assert_eq!(human_bytes(0), "0B");
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(1024), "1KiB");
        assert_eq!(human_bytes(1536), "1.5KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5MiB");
        assert_eq!(human_bytes((12.3 * 1024.0 * 1024.0 * 1024.0) as u64), "12.3GiB");
        assert_eq!(human_bytes(1 << 40), "1TiB");
        assert_eq!(human_bytes(u64::MAX), "16EiB");
    }

    #[test]
    fn estimates_cost_per_tebibyte() {
        let pricing = Pricing::default();
        assert_eq!(pricing.estimate(0), "$0.00000");
        assert_eq!(pricing.estimate(1 << 40), "$5.00000");
        assert_eq!(pricing.estimate(1 << 39), "$2.50000");
        assert_eq!(Pricing::new(6.25).estimate(1 << 40), "$6.25000");
    }

    #[test]
    fn formats_run_time() {
        assert_eq!(format_run_time(Duration::seconds(4)), "4s");
        assert_eq!(format_run_time(Duration::seconds(125)), "2m 05s");
        assert_eq!(format_run_time(Duration::seconds(3723)), "1h 02m 03s");
        assert_eq!(format_run_time(Duration::seconds(-3)), "0s");
    }

    #[test]
    fn normalizes_zero_byte_job() {
        let job = Job::from_raw(&list_item("p:j", "RUNNING", T0, None, 0), &Pricing::default()).unwrap();
        assert_eq!(job.data_queried_bytes, 0);
        assert_eq!(job.human_data_queried, "0B");
        assert_eq!(job.query_cost, "$0.00000");
    }

    #[test]
    fn normalizes_done_job() {
        let raw = list_item("proj:job_1", "DONE", T0, Some(T0 + 90_500), 1 << 40);
        let job = Job::from_raw(&raw, &Pricing::default()).unwrap();
        assert_eq!(job.id, "job_1");
        assert_eq!(job.user_name, "ops@example.com");
        assert_eq!(job.query.as_deref(), Some("select 1"));
        assert_eq!(job.job_type.as_deref(), Some("QUERY"));
        assert_eq!(job.status, State::Done);
        assert_eq!(job.human_data_queried, "1TiB");
        assert_eq!(job.query_cost, "$5.00000");
        assert_eq!(job.start_time, Some(Utc.timestamp_millis_opt(T0).unwrap()));
        assert_eq!(job.end_time, Some(Utc.timestamp_millis_opt(T0 + 90_500).unwrap()));
        assert_eq!(job.run_time(), Duration::milliseconds(90_500));
        assert!(!job.is_running());
    }

    #[test]
    fn running_job_run_time_grows() {
        let raw = list_item("proj:job_2", "RUNNING", T0, None, 10);
        let first = Job::from_raw(&raw, &Pricing::default()).unwrap();
        assert!(first.end_time.is_none());
        let before = first.run_time();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = Job::from_raw(&raw, &Pricing::default()).unwrap();
        assert!(second.run_time() > before);
        assert!(first.is_running());
    }

    #[test]
    fn run_time_is_never_negative() {
        let raw = list_item("proj:job_3", "RUNNING", T0, None, 10);
        let job = Job::from_raw(&raw, &Pricing::default()).unwrap();
        let earlier = Utc.timestamp_millis_opt(T0 - 60_000).unwrap();
        assert_eq!(job.run_time_at(earlier), Duration::zero());
    }

    #[test]
    fn end_time_ignored_unless_done() {
        let raw = list_item("proj:job_4", "RUNNING", T0, Some(T0 + 1000), 10);
        let job = Job::from_raw(&raw, &Pricing::default()).unwrap();
        assert!(job.end_time.is_none());
        let now = Utc.timestamp_millis_opt(T0 + 5000).unwrap();
        assert_eq!(job.run_time_at(now), Duration::seconds(5));
    }

    #[test]
    fn non_query_job_has_no_query() {
        let raw: JobListItem = serde_json::from_str(
            r#"{
                "id": "proj:load_1",
                "configuration": {"jobType": "LOAD"},
                "status": {"state": "PENDING"},
                "user_email": "loader@example.com"
            }"#,
        )
        .unwrap();
        let job = Job::from_raw(&raw, &Pricing::default()).unwrap();
        assert!(job.query.is_none());
        assert_eq!(job.status, State::Pending);
        assert!(job.start_time.is_none());
        assert_eq!(job.run_time(), Duration::zero());
    }

    #[test]
    fn missing_separator_fails_normalization() {
        let raw = list_item("no-separator", "DONE", T0, Some(T0), 0);
        assert!(matches!(
            Job::from_raw(&raw, &Pricing::default()),
            Err(BaqmanError::MalformedJobId(_))
        ));
    }

    #[test]
    fn list_and_get_shapes_normalize_identically() {
        let list: JobList = serde_json::from_str(
            r#"{
                "kind": "bigquery#jobList",
                "jobs": [{
                    "id": "proj:job_5",
                    "state": "DONE",
                    "errorResult": {"reason": "stopped", "message": "Job execution was cancelled"},
                    "statistics": {"startTime": "1650000000000", "endTime": "1650000004000", "totalBytesProcessed": "2048"},
                    "configuration": {"jobType": "QUERY", "query": {"query": "select * from t"}},
                    "status": {"state": "DONE", "errorResult": {"reason": "stopped", "message": "Job execution was cancelled"}},
                    "user_email": "a@example.com"
                }]
            }"#,
        )
        .unwrap();
        let get: structs::job::Job = serde_json::from_str(
            r#"{
                "kind": "bigquery#job",
                "id": "proj:job_5",
                "statistics": {"startTime": "1650000000000", "endTime": "1650000004000", "totalBytesProcessed": "2048"},
                "configuration": {"jobType": "QUERY", "query": {"query": "select * from t"}},
                "status": {"state": "DONE", "errorResult": {"reason": "stopped", "message": "Job execution was cancelled"}},
                "user_email": "a@example.com"
            }"#,
        )
        .unwrap();
        let pricing = Pricing::default();
        let from_list = Job::from_raw(&list.jobs[0], &pricing).unwrap();
        let from_get = Job::from_raw(&get, &pricing).unwrap();
        assert_eq!(from_list, from_get);
        assert_eq!(from_get.error_message.as_deref(), Some("Job execution was cancelled"));
        assert_eq!(from_get.human_data_queried, "2KiB");
    }
}
