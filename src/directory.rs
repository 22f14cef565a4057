use std::sync::Arc;

use futures::future::join_all;

use crate::client::JobsApi;
use crate::error::BaqmanError;
use crate::job::{Job, JobPage, Pricing};
use crate::structs::list_jobs_request::{ListJobsRequest, Projection};

/// Read and cancel jobs of a single project.
///
/// Holds no mutable state: one instance is shared by every request handler.
#[derive(Clone)]
pub struct JobDirectory {
    api: Arc<dyn JobsApi>,
    project_id: String,
    pricing: Pricing,
}

impl JobDirectory {
    pub fn new(api: Arc<dyn JobsApi>, project_id: impl Into<String>, pricing: Pricing) -> Self {
        JobDirectory {
            api,
            project_id: project_id.into(),
            pricing,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Jobs of all users, most recent first, split into running and the rest.
    /// An empty `page_token` asks for the first page.
    pub async fn list_jobs(&self, page_token: &str) -> Result<JobPage, BaqmanError> {
        let request = ListJobsRequest {
            all_users: true,
            projection: Projection::Full,
            page_token: (!page_token.is_empty()).then(|| page_token.to_string()),
            max_results: None,
        };
        let list = self.api.list(&self.project_id, &request).await?;

        let mut page = JobPage {
            next_page_token: list.next_page_token.unwrap_or_default(),
            ..Default::default()
        };
        for raw in &list.jobs {
            let job = match Job::from_raw(raw, &self.pricing) {
                Ok(job) => job,
                Err(e) => {
                    log::warn!("Skipping job record {:?}: {}", raw.id, e);
                    page.skipped += 1;
                    continue;
                }
            };
            if job.is_running() {
                page.running.push(job);
            } else {
                page.done.push(job);
            }
        }
        log::debug!(
            "Listed {} running and {} done jobs for {}",
            page.running.len(),
            page.done.len(),
            self.project_id
        );
        Ok(page)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job, BaqmanError> {
        let raw = self.api.get(&self.project_id, job_id).await?;
        Job::from_raw(&raw, &self.pricing)
    }

    /// Asks BigQuery to cancel a job. Cancellation is asynchronous on their
    /// side, so success here only means the request was accepted.
    pub async fn cancel_job(&self, job_id: &str) -> Result<(), BaqmanError> {
        let response = self.api.cancel(&self.project_id, job_id).await?;
        let state = response
            .job
            .as_ref()
            .and_then(|job| job.status.as_ref())
            .and_then(|status| status.state);
        match state {
            Some(state) => log::info!("Cancel requested for job {} (state: {})", job_id, state),
            None => log::info!("Cancel requested for job {}", job_id),
        }
        Ok(())
    }

    /// Cancels all `job_ids` concurrently. Outcomes come back in input order.
    pub async fn cancel_jobs(&self, job_ids: &[String]) -> Vec<(String, Result<(), BaqmanError>)> {
        let outcomes = join_all(job_ids.iter().map(|id| self.cancel_job(id))).await;
        job_ids.iter().cloned().zip(outcomes).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::structs;
    use crate::structs::job_cancel_response::JobCancelResponse;
    use crate::structs::job_list::JobList;
    use crate::structs::job_status::State;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory `JobsApi` serving canned pages and recording calls.
    #[derive(Default)]
    pub(crate) struct FakeJobsApi {
        pub pages: HashMap<String, JobList>,
        pub jobs: HashMap<String, structs::job::Job>,
        pub fail_with_status: Option<u16>,
        pub list_requests: Mutex<Vec<ListJobsRequest>>,
        pub cancelled: Mutex<Vec<String>>,
    }

    impl FakeJobsApi {
        fn check_failure(&self) -> Result<(), BaqmanError> {
            match self.fail_with_status {
                Some(status) => Err(BaqmanError::ApiError {
                    status,
                    message: "backend unavailable".into(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl JobsApi for FakeJobsApi {
        async fn list(
            &self,
            _project_id: &str,
            request: &ListJobsRequest,
        ) -> Result<JobList, BaqmanError> {
            self.list_requests.lock().unwrap().push(request.clone());
            self.check_failure()?;
            let key = request.page_token.clone().unwrap_or_default();
            Ok(self.pages.get(&key).cloned().unwrap_or_default())
        }

        async fn get(
            &self,
            _project_id: &str,
            job_id: &str,
        ) -> Result<structs::job::Job, BaqmanError> {
            self.check_failure()?;
            self.jobs
                .get(job_id)
                .cloned()
                .ok_or_else(|| BaqmanError::JobNotFound(job_id.to_string()))
        }

        async fn cancel(
            &self,
            _project_id: &str,
            job_id: &str,
        ) -> Result<JobCancelResponse, BaqmanError> {
            self.check_failure()?;
            if job_id == "missing" {
                return Err(BaqmanError::JobNotFound(job_id.to_string()));
            }
            self.cancelled.lock().unwrap().push(job_id.to_string());
            Ok(JobCancelResponse {
                kind: Some("bigquery#jobCancelResponse".into()),
                job: self.jobs.get(job_id).cloned(),
            })
        }
    }

    pub(crate) fn job_list_item_json(id: &str, state: &str) -> String {
        format!(
            r#"{{
                "id": "proj:{id}",
                "state": "{state}",
                "statistics": {{"startTime": "1650000000000", "endTime": "1650000060000", "totalBytesProcessed": "1099511627776"}},
                "configuration": {{"jobType": "QUERY", "query": {{"query": "select '{id}'"}}}},
                "status": {{"state": "{state}"}},
                "user_email": "{id}@example.com"
            }}"#
        )
    }

    pub(crate) fn job_list(items: &[(&str, &str)], next_page_token: Option<&str>) -> JobList {
        let jobs: Vec<String> = items
            .iter()
            .map(|(id, state)| job_list_item_json(id, state))
            .collect();
        let mut list: JobList =
            serde_json::from_str(&format!(r#"{{"jobs": [{}]}}"#, jobs.join(","))).unwrap();
        list.next_page_token = next_page_token.map(str::to_string);
        list
    }

    pub(crate) fn get_job(id: &str, state: &str) -> structs::job::Job {
        serde_json::from_str(&job_list_item_json(id, state)).unwrap()
    }

    pub(crate) fn sample_api() -> FakeJobsApi {
        let mut api = FakeJobsApi::default();
        api.pages.insert(
            String::new(),
            job_list(
                &[
                    ("r1", "RUNNING"),
                    ("d1", "DONE"),
                    ("p1", "PENDING"),
                    ("r2", "RUNNING"),
                    ("d2", "DONE"),
                ],
                Some("page-2"),
            ),
        );
        api.pages
            .insert("page-2".into(), job_list(&[("d3", "DONE"), ("d4", "DONE")], None));
        api.jobs.insert("r1".into(), get_job("r1", "RUNNING"));
        api.jobs.insert("d1".into(), get_job("d1", "DONE"));
        api
    }

    fn directory(api: FakeJobsApi) -> (Arc<FakeJobsApi>, JobDirectory) {
        let api = Arc::new(api);
        let directory = JobDirectory::new(api.clone(), "proj", Pricing::default());
        (api, directory)
    }

    fn ids(jobs: &[Job]) -> Vec<&str> {
        jobs.iter().map(|j| j.id.as_str()).collect()
    }

    #[tokio::test]
    async fn list_jobs_partitions_in_remote_order() {
        let (api, directory) = directory(sample_api());
        let page = directory.list_jobs("").await.unwrap();
        assert_eq!(ids(&page.running), vec!["r1", "r2"]);
        assert_eq!(ids(&page.done), vec!["d1", "p1", "d2"]);
        assert_eq!(page.next_page_token, "page-2");
        assert_eq!(page.skipped, 0);

        let requests = api.list_requests.lock().unwrap();
        assert_eq!(
            requests[0],
            ListJobsRequest {
                all_users: true,
                projection: Projection::Full,
                page_token: None,
                max_results: None,
            }
        );
    }

    #[tokio::test]
    async fn list_jobs_follows_page_token() {
        let (api, directory) = directory(sample_api());
        let page = directory.list_jobs("page-2").await.unwrap();
        assert!(page.running.is_empty());
        assert_eq!(ids(&page.done), vec!["d3", "d4"]);
        assert_eq!(page.next_page_token, "");
        assert_eq!(
            api.list_requests.lock().unwrap()[0].page_token.as_deref(),
            Some("page-2")
        );
    }

    #[tokio::test]
    async fn list_jobs_skips_malformed_records() {
        let mut api = FakeJobsApi::default();
        let mut list = job_list(&[("ok1", "DONE"), ("ok2", "RUNNING")], None);
        list.jobs[0].id = Some("no-separator".into());
        api.pages.insert(String::new(), list);
        let (_, directory) = directory(api);
        let page = directory.list_jobs("").await.unwrap();
        assert!(page.done.is_empty());
        assert_eq!(ids(&page.running), vec!["ok2"]);
        assert_eq!(page.skipped, 1);
        assert_eq!(page.running.len() + page.done.len() + page.skipped, 2);
    }

    #[tokio::test]
    async fn remote_errors_are_returned() {
        let api = FakeJobsApi {
            fail_with_status: Some(503),
            ..Default::default()
        };
        let (_, directory) = directory(api);
        assert!(matches!(
            directory.list_jobs("").await,
            Err(BaqmanError::ApiError { status: 503, .. })
        ));
        assert!(directory.get_job("r1").await.is_err());
        assert!(directory.cancel_job("r1").await.is_err());
    }

    #[tokio::test]
    async fn get_job_normalizes_like_list() {
        let (_, directory) = directory(sample_api());
        let from_get = directory.get_job("d1").await.unwrap();
        let page = directory.list_jobs("").await.unwrap();
        assert_eq!(page.done[0], from_get);
        assert_eq!(from_get.status, State::Done);
        assert_eq!(from_get.query_cost, "$5.00000");
        assert!(matches!(
            directory.get_job("nope").await,
            Err(BaqmanError::JobNotFound(id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn cancel_jobs_reports_each_outcome() {
        let (api, directory) = directory(sample_api());
        directory.cancel_job("r1").await.unwrap();
        let outcomes = directory
            .cancel_jobs(&["r2".to_string(), "missing".to_string()])
            .await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "r2");
        assert!(outcomes[0].1.is_ok());
        assert_eq!(outcomes[1].0, "missing");
        assert!(matches!(outcomes[1].1, Err(BaqmanError::JobNotFound(_))));
        assert_eq!(*api.cancelled.lock().unwrap(), vec!["r1", "r2"]);
    }
}
