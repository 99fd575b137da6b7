//! services/api/src/bin/api.rs

use axum::http::{header::CONTENT_TYPE, Method};
use companion_api_lib::{
    adapters::ProxyChatAdapter,
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use std::sync::Arc;
use std::time::Duration;
use study_companion_core::generator::StudyItemGenerator;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn http_client() -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Generator ---
    let generator = match &config.openai_api_key {
        Some(key) => {
            let chat = ProxyChatAdapter::new(
                http_client()?,
                config.proxy_url.clone(),
                config.chat_model.clone(),
                config.study_temperature,
            )
            .with_api_key(key.clone());
            let generator = StudyItemGenerator::new(None, Arc::new(chat))
                .with_temperature(config.study_temperature);
            Some(Arc::new(generator))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; study item generation will answer 500");
            None
        }
    };

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState { generator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 4. Create the Web Router ---
    let app = build_router(app_state).layer(cors);

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
