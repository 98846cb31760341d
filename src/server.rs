use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::error;

use crate::filters::{Selections, filter_options};
use crate::pattern_summary::{pattern_summary, summary_query_fields};
use crate::record::{FIELD_CHILD_NAME, FIELD_PHONE, FILTER_FIELDS};
use crate::store::RecordStore;
use crate::sync::SyncService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
    pub store: Arc<dyn RecordStore>,
    pub feedback_table: String,
}

/// The dashboard-facing routes: `GET /sync` triggers the full pipeline,
/// the two POST routes serve the read-only aggregators.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sync", get(sync_handler))
        .route("/filters", post(filters_handler))
        .route("/generate-summary", post(summary_handler))
        .with_state(state)
}

async fn sync_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.sync.run().await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": report.message() })),
        ),
        Err(e) => {
            error!(error = %e, "sync failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "server error" })),
            )
        }
    }
}

async fn filters_handler(
    State(state): State<AppState>,
    Json(selections): Json<Selections>,
) -> (StatusCode, Json<Value>) {
    let mut fields: Vec<&str> = FILTER_FIELDS.iter().map(|(_, f)| *f).collect();
    fields.push(FIELD_PHONE);
    fields.push(FIELD_CHILD_NAME);
    match state.store.query(&state.feedback_table, &fields).await {
        Ok(records) => {
            let resp = filter_options(&records, &selections);
            (StatusCode::OK, Json(json!(resp)))
        }
        Err(e) => {
            error!(error = %e, "filter query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "error generating filters" })),
            )
        }
    }
}

async fn summary_handler(
    State(state): State<AppState>,
    Json(selections): Json<Selections>,
) -> (StatusCode, Json<Value>) {
    let fields = summary_query_fields();
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    match state.store.query(&state.feedback_table, &fields).await {
        Ok(records) => {
            let summary = pattern_summary(&records, &selections);
            (StatusCode::OK, Json(json!(summary)))
        }
        Err(e) => {
            error!(error = %e, "summary query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "error generating summary" })),
            )
        }
    }
}

/// Binds and serves the router on a background task.
pub async fn run_server(state: AppState, host: &str, port: u16) -> anyhow::Result<JoinHandle<()>> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving dashboard API");
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "server exited");
        }
    }))
}
