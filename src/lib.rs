//! HTTP gateway between the skin scanner web client and the remote skin condition classifier.
//!
//! `POST /api/analyze` takes a multipart form with a single `file` field (JPEG, PNG or WEBP, at
//! most 4 MiB), forwards it to the prediction service under a deadline and relays the result with
//! confidences normalized to percentages. Outside production, failures of the prediction service
//! are answered with a fixed demo result instead.
//!
//! Configuration is read from the environment, see [`config::Config`].

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

pub mod config;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod prediction;
pub mod routes;
pub mod upload;
pub mod upstream;

use config::Config;
use error::{panic_response, StartupError};
use gateway::Gateway;
use routes::{analyze_handler, health_check, AppState};
use upstream::{Deadline, HttpPredictionService};

pub fn router(gateway: Gateway, body_limit_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(Arc::new(AppState { gateway }))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server() -> Result<(), StartupError> {
    let config = Config::load()?;
    info!(
        "Deployment mode {:?}, forwarding to {} with a {}s deadline",
        config.deployment_mode,
        config.prediction_url,
        config.prediction_timeout.as_secs()
    );

    let client = reqwest::Client::builder().build()?;
    let gateway = Gateway::new(
        Arc::new(HttpPredictionService::new(client, config.prediction_url.clone())),
        Deadline::new(config.prediction_timeout),
        fallback::for_mode(config.deployment_mode),
    );
    let app = router(gateway, config.body_limit_bytes);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
