//! HTTP front end: upload a purchase request, download the letter.

mod handlers;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::Settings;

pub use handlers::{
    download, upload, upload_form, MSG_EMPTY_NAME, MSG_NOT_DOCX, MSG_NO_FILE, MSG_NO_LETTER,
};

/// State shared by the handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Job served by a plain `GET /download`.
    pub latest_job: Arc<Mutex<Option<String>>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            latest_job: Arc::new(Mutex::new(None)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes;
    Router::new()
        .route("/", get(upload_form).post(upload))
        .route("/download", get(download))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    settings.ensure_upload_dir()?;
    if !settings.template.is_file() {
        tracing::warn!(
            template = %settings.template.display(),
            "letter template not found; uploads will fail until it exists"
        );
    }
    let addr = settings.bind.clone();
    let app = build_router(AppState::new(settings));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
