use std::{any::Any as PanicPayload, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use docqa_rag::qa::INTERNAL_ERROR_ANSWER;
use docqa_rag::{DocumentQa, QaResponse};
use serde::Deserialize;
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct AppState {
    pub qa: Arc<DocumentQa>,
    /// Directory holding the images saved by `docqa build`.
    pub image_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 5000 }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let images = ServeDir::new(&state.image_dir);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ask", post(ask).layer(CatchPanicLayer::custom(internal_error_reply)))
        .nest_service("/static/images", images)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// A panic while answering still gets the regular reply shape.
fn internal_error_reply(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "ask handler panicked");
    Json(json!({"answer": INTERNAL_ERROR_ANSWER, "images": []})).into_response()
}

async fn index() -> impl IntoResponse {
    Html(include_str!("../ui/index.html"))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docqa","chunks": state.qa.chunk_count()}))
}

async fn ask(State(state): State<AppState>, request: Request) -> Json<QaResponse> {
    let question = read_question(request).await.unwrap_or_default();
    Json(state.qa.ask(&question).await)
}

/// The question from a JSON or form-encoded body. Unreadable bodies yield `None`.
async fn read_question(request: Request) -> Option<String> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    let parsed = if is_json {
        Json::<AskRequest>::from_request(request, &()).await.map(|Json(body)| body).map_err(|e| e.body_text())
    } else {
        Form::<AskRequest>::from_request(request, &()).await.map(|Form(body)| body).map_err(|e| e.body_text())
    };

    match parsed {
        Ok(body) => body.question,
        Err(reason) => {
            debug!(%reason, "unreadable ask body");
            None
        }
    }
}
