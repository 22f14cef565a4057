#[derive(thiserror::Error, Debug)]
pub enum BaqmanError {
    #[error("Authentication error (error: {0})")]
    YupAuthError(#[from] yup_oauth2::Error),
    #[error("Failed to set up google credentials (error: {0})")]
    AuthSetupError(#[from] std::io::Error),
    #[error("Invalid api endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("Request to google api error (error: {0})")]
    ApiRequestError(#[from] reqwest::Error),
    #[error("Google api returned {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Job '{0}' not found")]
    JobNotFound(String),
    #[error("Malformed job id '{0}': expected '<project>:<jobId>'")]
    MalformedJobId(String),
    #[error("Malformed google api response: missing {0}")]
    MissingField(&'static str),
    #[error("Timestamp {0}ms is out of range")]
    InvalidTimestamp(i64),
}

impl BaqmanError {
    /// True for failures of the remote service or of the way we reach it, as
    /// opposed to problems with a single record.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            BaqmanError::YupAuthError(_)
                | BaqmanError::AuthSetupError(_)
                | BaqmanError::ApiRequestError(_)
                | BaqmanError::ApiError { .. }
        )
    }
}
