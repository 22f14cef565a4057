use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_API_ENDPOINT;
use crate::job::Pricing;

/// Signing keys are derived from the secret, which needs at least 32 bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Parser, Debug, Default)]
#[command(name = "baqman", version, about = "List, inspect and cancel BigQuery jobs of a project")]
pub struct Cli {
    /// TOML file with defaults; flags take precedence over it
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// List queries running under this project
    #[arg(long = "project-id", alias = "projectID", env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    /// HTTP port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
    /// Secret used to sign the flash message cookie
    #[arg(long = "session-secret", alias = "sessionSecret", env = "BAQMAN_SESSION_SECRET")]
    pub session_secret: Option<String>,
    /// On-demand price in USD per TiB scanned
    #[arg(long = "price-per-tib")]
    pub price_per_tib: Option<f64>,
    /// Service account or authorized user key file
    #[arg(long)]
    pub credentials: Option<PathBuf>,
    #[arg(long = "api-endpoint")]
    pub api_endpoint: Option<String>,
    #[arg(long = "assets-dir")]
    pub assets_dir: Option<PathBuf>,
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project_id: String,
    pub host: String,
    pub port: u16,
    pub session_secret: String,
    pub price_per_tib: f64,
    pub credentials: Option<PathBuf>,
    pub api_endpoint: String,
    pub assets_dir: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            session_secret: "itsy bitsy spider climbed up the water spout".to_string(),
            price_per_tib: Pricing::DEFAULT_USD_PER_TIB,
            credentials: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            assets_dir: PathBuf::from("assets"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Builds the effective configuration: defaults, then the config file,
    /// then command line flags and their environment variables.
    pub fn load(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_toml_file(path)?,
            None => Config::default(),
        };
        config.merge(cli);
        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, cli: Cli) {
        if let Some(project_id) = cli.project_id {
            self.project_id = project_id;
        }
        if let Some(host) = cli.host {
            self.host = host;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(secret) = cli.session_secret {
            self.session_secret = secret;
        }
        if let Some(price) = cli.price_per_tib {
            self.price_per_tib = price;
        }
        if cli.credentials.is_some() {
            self.credentials = cli.credentials;
        }
        if let Some(endpoint) = cli.api_endpoint {
            self.api_endpoint = endpoint;
        }
        if let Some(dir) = cli.assets_dir {
            self.assets_dir = dir;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            bail!("projectID can't be empty: pass --project-id or set GOOGLE_CLOUD_PROJECT");
        }
        if self.session_secret.len() < MIN_SESSION_SECRET_LEN {
            bail!(
                "session secret must be at least {} bytes long",
                MIN_SESSION_SECRET_LEN
            );
        }
        if !self.price_per_tib.is_finite() || self.price_per_tib < 0.0 {
            bail!("price per TiB must be a non-negative number, got {}", self.price_per_tib);
        }
        Ok(())
    }

    pub fn pricing(&self) -> Pricing {
        Pricing::new(self.price_per_tib)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
