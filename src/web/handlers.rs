use actix_web::http::header::{self, ContentType};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::error::BaqmanError;
use crate::web::flash::FlashMessage;
use crate::web::{render, AppState};

#[derive(Debug, Deserialize)]
pub struct CompletedParams {
    pub token: Option<String>,
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body)
}

/// Response that consumes the request's flash messages.
fn html_with_flashes(state: &AppState, had_flashes: bool, body: String) -> HttpResponse {
    let mut builder = HttpResponse::Ok();
    builder.content_type(ContentType::html());
    if had_flashes {
        builder.cookie(state.flash.clear());
    }
    builder.body(body)
}

fn redirect_with_flashes(state: &AppState, location: &str, flashes: &[FlashMessage]) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .cookie(state.flash.store(flashes))
        .finish()
}

/// GET / - running jobs of the first page
pub async fn index(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, BaqmanError> {
    let flashes = state.flash.read(&req);
    let page = state.directory.list_jobs("").await?;
    let body = render::index(&flashes, &page);
    Ok(html_with_flashes(&state, !flashes.is_empty(), body))
}

/// GET /completed?token= - one page of finished jobs
pub async fn completed(
    state: web::Data<AppState>,
    params: web::Query<CompletedParams>,
) -> Result<HttpResponse, BaqmanError> {
    let token = params.token.as_deref().unwrap_or_default();
    let page = state.directory.list_jobs(token).await?;
    Ok(html(render::completed(&page)))
}

/// GET /describe/{job_id}
pub async fn describe(
    req: HttpRequest,
    state: web::Data<AppState>,
    job_id: web::Path<String>,
) -> Result<HttpResponse, BaqmanError> {
    let flashes = state.flash.read(&req);
    let job = state.directory.get_job(&job_id).await?;
    let body = render::describe(&flashes, &job);
    Ok(html_with_flashes(&state, !flashes.is_empty(), body))
}

fn cancel_outcome(job_id: &str, result: Result<(), BaqmanError>) -> FlashMessage {
    match result {
        Ok(()) => FlashMessage::info(format!("Cancellation requested for job {}", job_id)),
        Err(e) => {
            log::error!("Failed to cancel job {}: {}", job_id, e);
            FlashMessage::error(format!("Failed to cancel job {}: {}", job_id, e))
        }
    }
}

/// GET /kill/{job_id} - cancel, then back to the job's page
pub async fn kill_job(
    req: HttpRequest,
    state: web::Data<AppState>,
    job_id: web::Path<String>,
) -> HttpResponse {
    let job_id = job_id.into_inner();
    log::info!("cancelling job {}", job_id);
    let mut flashes = state.flash.read(&req);
    let result = state.directory.cancel_job(&job_id).await;
    flashes.push(cancel_outcome(&job_id, result));
    redirect_with_flashes(&state, &format!("/describe/{}", job_id), &flashes)
}

/// POST /killmany - cancel every `jobkill` field of the form
pub async fn kill_many(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<Vec<(String, String)>>,
) -> HttpResponse {
    let job_ids: Vec<String> = form
        .into_inner()
        .into_iter()
        .filter(|(name, value)| name == "jobkill" && !value.is_empty())
        .map(|(_, value)| value)
        .collect();
    log::info!("cancelling jobs {:?}", job_ids);

    let mut flashes = state.flash.read(&req);
    for (job_id, result) in state.directory.cancel_jobs(&job_ids).await {
        flashes.push(cancel_outcome(&job_id, result));
    }
    redirect_with_flashes(&state, "/", &flashes)
}

/// GET /_ah/health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("ok")
}
