use std::path::{Path, PathBuf};

use serde::Deserialize;
use yup_oauth2::authenticator::{ApplicationDefaultCredentialsTypes, DefaultAuthenticator};
use yup_oauth2::{
    ApplicationDefaultCredentialsAuthenticator, ApplicationDefaultCredentialsFlowOpts,
    AuthorizedUserAuthenticator, ServiceAccountAuthenticator,
};

use crate::error::BaqmanError;

const GCLOUD_ADC_FILE: &str = ".config/gcloud/application_default_credentials.json";

/// Where google credentials come from. Built once at startup and handed to
/// the client, instead of being looked up from ambient state on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `gcloud auth application-default login` output.
    AuthorizedUser(PathBuf),
    ServiceAccount(PathBuf),
    /// GOOGLE_APPLICATION_CREDENTIALS, then the metadata server.
    ApplicationDefault,
}

#[derive(Deserialize)]
struct KeyFileType {
    #[serde(rename = "type")]
    key_type: String,
}

impl Credentials {
    /// Picks a source from an explicit key file, the gcloud well-known file
    /// under `home`, or falls back to application default credentials.
    pub fn discover(key_file: Option<&Path>, home: Option<&Path>) -> Result<Self, BaqmanError> {
        if let Some(path) = key_file {
            return Self::from_key_file(path);
        }
        if std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").is_none() {
            if let Some(home) = home {
                let adc = home.join(GCLOUD_ADC_FILE);
                if adc.is_file() {
                    return Ok(Credentials::AuthorizedUser(adc));
                }
            }
        }
        Ok(Credentials::ApplicationDefault)
    }

    /// Reads the `type` field of a key file to tell the two formats apart.
    pub fn from_key_file(path: &Path) -> Result<Self, BaqmanError> {
        let content = std::fs::read_to_string(path)?;
        let KeyFileType { key_type } = serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}: {}", path.display(), e),
            )
        })?;
        match key_type.as_str() {
            "authorized_user" => Ok(Credentials::AuthorizedUser(path.to_path_buf())),
            "service_account" => Ok(Credentials::ServiceAccount(path.to_path_buf())),
            other => Err(BaqmanError::AuthSetupError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}: unsupported credentials type '{}'", path.display(), other),
            ))),
        }
    }

    pub async fn authenticator(&self) -> Result<DefaultAuthenticator, BaqmanError> {
        let authenticator = match self {
            Credentials::AuthorizedUser(path) => {
                let secret = yup_oauth2::read_authorized_user_secret(path).await?;
                AuthorizedUserAuthenticator::builder(secret).build().await?
            }
            Credentials::ServiceAccount(path) => {
                let key = yup_oauth2::read_service_account_key(path).await?;
                ServiceAccountAuthenticator::builder(key).build().await?
            }
            Credentials::ApplicationDefault => {
                let opts = ApplicationDefaultCredentialsFlowOpts::default();
                match ApplicationDefaultCredentialsAuthenticator::builder(opts).await {
                    ApplicationDefaultCredentialsTypes::InstanceMetadata(auth) => {
                        auth.build().await?
                    }
                    ApplicationDefaultCredentialsTypes::ServiceAccount(auth) => {
                        auth.build().await?
                    }
                }
            }
        };
        Ok(authenticator)
    }
}
