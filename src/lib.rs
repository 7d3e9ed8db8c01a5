pub mod api;
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::registry::TransferRegistry;
use crate::services::storage::LocalStorage;
use crate::services::transfer::TransferService;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::upload::upload_transfer, handlers::health::api_test),
    components(schemas(handlers::upload::UploadResponse)),
    tags(
        (name = "transfers", description = "File transfer endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TransferRegistry>,
    pub storage: Arc<LocalStorage>,
    pub transfers: Arc<TransferService>,
}

impl AppState {
    /// Config is consumed here: the registry keeps the retention window and
    /// the store keeps its root, so handlers never re-derive either.
    pub fn new(config: AppConfig) -> Self {
        let registry = Arc::new(TransferRegistry::new(config.retention()));
        let storage = Arc::new(LocalStorage::new(&config.storage_dir));
        let transfers = Arc::new(TransferService::new(registry.clone(), storage.clone()));
        Self {
            registry,
            storage,
            transfers,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/upload", post(handlers::upload::upload_transfer))
        .route("/api/test", get(handlers::health::api_test))
        .route("/download/:id", get(handlers::download::download_transfer))
        .route(
            "/download-file/:id/:stored_name",
            get(handlers::download::download_single_file),
        )
        .fallback_service(ServeDir::new("static"))
        .with_state(state)
}
