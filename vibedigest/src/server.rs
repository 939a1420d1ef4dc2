use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{get, options, post, routes, Build, Request, Response, Rocket, State};
use serde::{Deserialize, Serialize};

use common::Config;

use crate::digest::Digest;
use crate::llm::summarizer::OutputLanguage;
use crate::types::{ModelCandidate, SummaryResult};

const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "*"];

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub digest: Arc<Digest>,
}

impl AppState {
    pub fn new(digest: Arc<Digest>) -> Self {
        Self { started_at: Utc::now(), digest }
    }
}

/// Request body for `/api/summarize`.
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub url: String,
}

/// Error body; `detail` is what browser clients display.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Response structure for `/api/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    backends: Vec<&'static str>,
    language: String,
    api_key_configured: bool,
}

type ApiError = (Status, Json<ErrorBody>);

fn internal_error(detail: String) -> ApiError {
    (Status::InternalServerError, Json(ErrorBody { detail }))
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint with uptime and the active pipeline settings.
#[get("/api/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let language = match state.digest.language() {
        OutputLanguage::SameAsSource => "source".to_string(),
        OutputLanguage::Fixed(language) => language.clone(),
    };

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        backends: state.digest.backend_names(),
        language,
        api_key_configured: state.digest.has_api_key(),
    })
}

/// Candidate models in the order the summarizer would try them.
#[get("/api/models")]
async fn models(state: &State<AppState>) -> Json<Vec<ModelCandidate>> {
    Json(state.digest.candidate_models().await)
}

#[post("/api/summarize", data = "<request>")]
async fn summarize(state: &State<AppState>, request: Json<SummarizeRequest>) -> Result<Json<SummaryResult>, ApiError> {
    let url = request.into_inner().url;
    tracing::info!(url = %url, "summarize request");

    match state.digest.summarize_url(&url).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!(url = %url, "summarize failed: {}", e);
            Err(internal_error(e.to_string()))
        }
    }
}

/// Answers CORS preflight requests for any path.
#[options("/<_..>")]
async fn preflight() -> Status {
    Status::NoContent
}

/// Adds `Access-Control-Allow-*` headers for allowed origins.
pub struct Cors {
    allowed_origins: Vec<String>,
}

impl Cors {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        let origin = origin?;
        if self.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_string())
        } else if self.allowed_origins.iter().any(|o| o == "*") {
            Some("*".to_string())
        } else {
            None
        }
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let Some(origin) = self.allow_origin(request.headers().get_one("Origin")) else {
            return;
        };
        response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        response.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
        response.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type, Authorization"));
    }
}

/// Builds the Rocket instance, taking bind address and port from `[server]`.
pub fn build_rocket(state: AppState, config: &Config) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(bind) = &config.server.bind {
        fig = fig.merge(("address", bind.clone()));
    }
    if let Some(port) = config.server.port {
        fig = fig.merge(("port", port));
    }

    let origins = if config.server.cors_origins.is_empty() {
        DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect()
    } else {
        config.server.cors_origins.clone()
    };

    rocket::custom(fig)
        .manage(state)
        .attach(Cors::new(origins))
        .mount("/", routes![health, status, models, summarize, preflight])
}

pub async fn launch_rocket(digest: Arc<Digest>, config: &Config) -> Result<()> {
    let rocket = build_rocket(AppState::new(digest), config);

    // Runs until shutdown (SIGINT/SIGTERM etc.)
    tracing::info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
