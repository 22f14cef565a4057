use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use baqman::config::{Cli, Config};
use baqman::{Client, Credentials, JobDirectory};
use clap::Parser;

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[actix_web::main]
async fn main() -> Result<()> {
    let config = Config::load(Cli::parse())?;
    init_logging(&config.log_level);

    let home = std::env::var_os("HOME").map(PathBuf::from);
    let credentials = Credentials::discover(config.credentials.as_deref(), home.as_deref())
        .context("Failed to locate google credentials")?;
    log::info!("Using credentials: {:?}", credentials);
    let client = Client::with_endpoint(&credentials, &config.api_endpoint)
        .await
        .context("Failed to create BigQuery client")?;

    let directory = JobDirectory::new(Arc::new(client), config.project_id.clone(), config.pricing());
    log::info!(
        "Running BaqMan for project: {} on port {}",
        directory.project_id(),
        config.port
    );
    baqman::web::run(&config, directory)
        .await
        .context("HTTP server stopped with an error")?;
    Ok(())
}
