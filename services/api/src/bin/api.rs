//! services/api/src/bin/api.rs

use api_lib::{
    adapters::db::PgStore,
    config::Config,
    error::ApiError,
    web::{
        create_annotation_handler, create_document_handler, create_version_handler,
        delete_document_handler, fetch_document_handler, resolve_annotation_handler,
        rest::ApiDoc, save_body_handler, set_status_handler, set_title_handler,
        state::AppState,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        documents: store.clone(),
        feedback: store,
        config: config.clone(),
    });

    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().map_err(|e| {
            ApiError::Internal(format!("Invalid CORS origin: {e}"))
        })?)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let api_router = Router::new()
        .route("/documents", post(create_document_handler))
        .route(
            "/documents/{id}",
            get(fetch_document_handler).delete(delete_document_handler),
        )
        .route("/documents/{id}/body", put(save_body_handler))
        .route("/documents/{id}/versions", post(create_version_handler))
        .route("/documents/{id}/status", put(set_status_handler))
        .route("/documents/{id}/title", put(set_title_handler))
        .route(
            "/documents/{id}/annotations",
            post(create_annotation_handler),
        )
        .route(
            "/annotations/{id}/resolve",
            post(resolve_annotation_handler),
        )
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
