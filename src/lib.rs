pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;

use crate::config::AppConfig;
use crate::services::avatar_service::AvatarService;
use crate::services::grant::GrantIssuer;
use crate::services::records::RecordStore;
use crate::services::storage::BlobStore;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::avatar::get_upload_url,
        api::handlers::avatar::update_avatar,
        api::handlers::avatar::get_user_avatar,
        api::handlers::session::login,
        api::handlers::session::whoami,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::avatar::CommitAvatarRequest,
            api::handlers::session::LoginRequest,
            api::handlers::session::WhoAmIResponse,
            api::handlers::health::HealthResponse,
            services::grant::UploadGrant,
            services::avatar_service::CommitReceipt,
            models::UserRecord,
        )
    ),
    tags(
        (name = "avatar", description = "Avatar upload grants and commits"),
        (name = "session", description = "Cookie session helpers"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub grants: Arc<GrantIssuer>,
    pub avatars: Arc<AvatarService>,
}

impl AppState {
    /// Wires the grant issuer and commit coordinator over the given stores.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            avatars: Arc::new(AvatarService::new(blobs.clone(), records.clone(), &config)),
            grants: Arc::new(GrantIssuer::new(blobs, config)),
            records,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/login", put(api::handlers::session::login))
        .route("/whoami", get(api::handlers::session::whoami))
        .route("/get_upload_url", get(api::handlers::avatar::get_upload_url))
        .route("/update_avatar", post(api::handlers::avatar::update_avatar))
        .route(
            "/user/:username/avatar",
            get(api::handlers::avatar::get_user_avatar),
        )
        .layer(from_fn(api::middleware::session::session_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(16 * 1024))
        .with_state(state)
}
