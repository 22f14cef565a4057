//! HTTP front end: routing, server bootstrap and error pages.

pub mod flash;
pub mod handlers;
pub mod render;

use std::time::Duration;

use actix_files::Files;
use actix_web::body::BoxBody;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, ResponseError};

use crate::config::Config;
use crate::directory::JobDirectory;
use crate::error::BaqmanError;
use flash::FlashStore;

const COMBINED_LOG_FORMAT: &str = r#"%a - - %t "%r" %s %b "%{Referer}i" "%{User-Agent}i""#;
const CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

/// Shared by all workers.
pub struct AppState {
    pub directory: JobDirectory,
    pub flash: FlashStore,
}

impl AppState {
    pub fn new(directory: JobDirectory, flash: FlashStore) -> Self {
        AppState { directory, flash }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/completed", web::get().to(handlers::completed))
        .route("/describe/{job_id}", web::get().to(handlers::describe))
        .route("/kill/{job_id}", web::get().to(handlers::kill_job))
        .route("/killmany", web::post().to(handlers::kill_many))
        .route("/_ah/health", web::get().to(handlers::health_check));
}

impl ResponseError for BaqmanError {
    fn status_code(&self) -> StatusCode {
        match self {
            BaqmanError::JobNotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_remote() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::info!("Request failed: {}", self);
        }
        HttpResponse::build(status)
            .content_type(ContentType::html())
            .body(render::error_page(status.as_u16(), &self.to_string()))
    }
}

/// Serves the dashboard until the process receives a termination signal.
pub async fn run(config: &Config, directory: JobDirectory) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(
        directory,
        FlashStore::new(&config.session_secret),
    ));
    let assets_dir = config.assets_dir.clone();
    let serve_assets = assets_dir.is_dir();
    if !serve_assets {
        log::warn!(
            "Assets directory {} not found, /assets will not be served",
            assets_dir.display()
        );
    }

    let bind_addr = config.bind_address();
    log::info!("Listening on http://{}", bind_addr);

    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::new(COMBINED_LOG_FORMAT))
            .app_data(state.clone())
            .configure(configure);
        if serve_assets {
            app = app.service(Files::new("/assets", assets_dir.clone()));
        }
        app
    })
    .client_request_timeout(CLIENT_REQUEST_TIMEOUT)
    .bind(bind_addr)?
    .run()
    .await
}
