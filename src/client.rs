use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use yup_oauth2::authenticator::DefaultAuthenticator;

use crate::credentials::Credentials;
use crate::error::BaqmanError;
use crate::structs::google_error::GoogleErrorResponse;
use crate::structs::job::Job;
use crate::structs::job_cancel_response::JobCancelResponse;
use crate::structs::job_list::JobList;
use crate::structs::list_jobs_request::ListJobsRequest;

pub const DEFAULT_API_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";
const SCOPES: &[&str; 1] = &["https://www.googleapis.com/auth/bigquery"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

/// The three calls of the BigQuery `jobs` resource the dashboard relies on.
#[async_trait]
pub trait JobsApi: Send + Sync {
    async fn list(&self, project_id: &str, request: &ListJobsRequest)
        -> Result<JobList, BaqmanError>;
    async fn get(&self, project_id: &str, job_id: &str) -> Result<Job, BaqmanError>;
    async fn cancel(&self, project_id: &str, job_id: &str)
        -> Result<JobCancelResponse, BaqmanError>;
}

#[derive(Clone)]
struct InnerClient {
    authenticator: DefaultAuthenticator,
    reqwest_client: reqwest::Client,
    api_endpoint: String,
}

/// REST implementation of [`JobsApi`]. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner_client: Arc<InnerClient>,
}

impl Client {
    pub async fn new(credentials: &Credentials) -> Result<Self, BaqmanError> {
        Self::with_endpoint(credentials, DEFAULT_API_ENDPOINT).await
    }

    pub async fn with_endpoint(
        credentials: &Credentials,
        api_endpoint: &str,
    ) -> Result<Self, BaqmanError> {
        let authenticator = credentials.authenticator().await?;
        let reqwest_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Client {
            inner_client: Arc::new(InnerClient {
                authenticator,
                reqwest_client,
                api_endpoint: api_endpoint.trim_end_matches('/').to_string(),
            }),
        })
    }

    fn jobs_url(&self, project_id: &str) -> String {
        format!(
            "{endpoint}/projects/{project_id}/jobs",
            endpoint = self.inner_client.api_endpoint,
            project_id = project_id
        )
    }

    fn job_url(&self, project_id: &str, job_id: &str, action: Option<&str>) -> Result<Url, BaqmanError> {
        job_url(&self.jobs_url(project_id), job_id, action)
    }

    async fn token(&self) -> Result<String, BaqmanError> {
        let tok = self.inner_client.authenticator.token(SCOPES).await?;
        Ok(tok.as_str().to_string())
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        job_id: Option<&str>,
    ) -> Result<T, BaqmanError> {
        let tok = self.token().await?;
        let res = request.bearer_auth(tok).send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res.json().await?);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(job_id) = job_id {
                return Err(BaqmanError::JobNotFound(job_id.to_string()));
            }
        }
        let body = res.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }
}

/// `{jobs_url}/{job_id}[/{action}]` with `job_id` as one escaped path segment,
/// so ids taken from a request path cannot add segments or a query string.
fn job_url(jobs_url: &str, job_id: &str, action: Option<&str>) -> Result<Url, BaqmanError> {
    let mut url = Url::parse(jobs_url).map_err(|e| BaqmanError::InvalidEndpoint(e.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| BaqmanError::InvalidEndpoint(jobs_url.to_string()))?;
        segments.push(job_id);
        if let Some(action) = action {
            segments.push(action);
        }
    }
    Ok(url)
}

/// Turns a non-2xx body into an error, using Google's message when there is one.
fn api_error(status: u16, body: &str) -> BaqmanError {
    let message = match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(GoogleErrorResponse { error }) if !error.message.is_empty() => error.message,
        _ => body.trim().to_string(),
    };
    BaqmanError::ApiError { status, message }
}

#[async_trait]
impl JobsApi for Client {
    async fn list(
        &self,
        project_id: &str,
        request: &ListJobsRequest,
    ) -> Result<JobList, BaqmanError> {
        let req = self
            .inner_client
            .reqwest_client
            .get(self.jobs_url(project_id))
            .query(request);
        self.send(req, None).await
    }

    async fn get(&self, project_id: &str, job_id: &str) -> Result<Job, BaqmanError> {
        let api_url = self.job_url(project_id, job_id, None)?;
        let req = self.inner_client.reqwest_client.get(api_url);
        self.send(req, Some(job_id)).await
    }

    async fn cancel(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<JobCancelResponse, BaqmanError> {
        let api_url = self.job_url(project_id, job_id, Some("cancel"))?;
        let req = self.inner_client.reqwest_client.post(api_url);
        self.send(req, Some(job_id)).await
    }
}
