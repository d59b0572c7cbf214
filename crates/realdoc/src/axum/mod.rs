use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

pub mod handler;

pub use handler::WebSocketHandler;

use crate::document::DocumentService;
use crate::session::SubscriberRegistry;

/// Axum state wrapper for realdoc
#[derive(Clone)]
pub struct AppState {
    service: Arc<DocumentService>,
    registry: Arc<SubscriberRegistry>,
}

impl AppState {
    /// Create a new app state
    pub fn new(service: Arc<DocumentService>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { service, registry }
    }

    /// Get the document service
    pub fn service(&self) -> &Arc<DocumentService> {
        &self.service
    }

    /// Get the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }
}

/// Body of the document save request and of the document fetch response
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentContent {
    pub content: String,
}

/// Build the realdoc router: WebSocket endpoint plus HTTP document routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/ws/{document_id}", get(websocket_endpoint))
        .route("/api/health", get(health_check))
        .route(
            "/api/documents/{doc_id}",
            get(get_document).post(save_document),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn welcome() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the RealDoc API",
        "endpoints": {
            "websocket": "/ws/{document_id}",
            "documents": "/api/documents/{doc_id}",
            "health": "/api/health",
        },
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fetch a document, lazily creating it empty if unknown
async fn get_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<DocumentContent>, StatusCode> {
    match state.service.fetch_or_create(&doc_id).await {
        Ok(content) => Ok(Json(DocumentContent { content })),
        Err(e) => {
            error!("Error loading document '{}': {}", doc_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Save a document and notify its current subscribers
async fn save_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Json(body): Json<DocumentContent>,
) -> Result<Json<Value>, StatusCode> {
    match state.service.save_and_notify(&doc_id, &body.content).await {
        Ok(()) => Ok(Json(json!({ "message": "Document saved successfully" }))),
        Err(e) => {
            error!("Error saving document '{}': {}", doc_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// WebSocket upgrade endpoint; one connection serves one document
async fn websocket_endpoint(
    ws: WebSocketUpgrade,
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| WebSocketHandler::new(socket, state, document_id).handle())
}
