//! Gateway server setup
//!
//! Routes, dependency wiring and the serve loop with graceful shutdown.

mod media;
mod socket;
mod state;
mod upload;

pub use media::{attachment_handler, avatar_handler};
pub use socket::gateway_handler;
pub use state::GatewayState;
pub use upload::{upload_handler, UploadError};

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use huddle_common::{AppConfig, AppError, StorageBackend};
use huddle_core::traits::{EmbedFetcher, Storage};
use huddle_core::SnowflakeGenerator;
use huddle_db::{MemoryStorage, PgStorage};
use huddle_service::bootstrap::bootstrap;
use huddle_service::external::{
    DisabledEmbedFetcher, FsMediaStore, HCaptchaVerifier, HttpEmbedFetcher,
};
use huddle_service::{Index, ServiceContext};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::connection::SWEEP_INTERVAL;

/// Create the gateway router
pub fn create_router(max_upload_bytes: usize) -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route(
            "/upload/:slot_id",
            post(upload_handler).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/attachments/:attachment_id/:filename", get(attachment_handler))
        .route("/avatars/:user_id", get(avatar_handler))
        .route("/health", get(health_check))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    connections: usize,
}

/// Health check endpoint
async fn health_check(State(state): State<GatewayState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        connections: state.registry().connection_count(),
    })
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router(state.max_upload_bytes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and create `GatewayState`
pub async fn create_gateway_state(
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<GatewayState, AppError> {
    let storage: Arc<dyn Storage> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .ok_or_else(|| AppError::config("DATABASE_URL is required for postgres storage"))?;
            tracing::info!("Connecting to PostgreSQL...");
            let pool = huddle_db::create_pool(db_config)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            huddle_db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            tracing::info!("PostgreSQL connection established");
            Arc::new(PgStorage::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, nothing survives a restart");
            Arc::new(MemoryStorage::new())
        }
    };

    let snowflakes = SnowflakeGenerator::new(config.snowflake.worker_id)
        .map_err(|e| AppError::config(e.to_string()))?;

    let embeds: Arc<dyn EmbedFetcher> = if config.embeds.enabled {
        Arc::new(HttpEmbedFetcher::new(&config.embeds)?)
    } else {
        Arc::new(DisabledEmbedFetcher)
    };

    let ctx = ServiceContext::builder()
        .storage(storage)
        .index(Arc::new(Index::new()))
        .snowflakes(Arc::new(snowflakes))
        .media(Arc::new(FsMediaStore::new(config.storage.media_dir.clone())))
        .embeds(embeds)
        .captcha(Arc::new(HCaptchaVerifier::new()))
        .shutdown(shutdown)
        .build()
        .map_err(|e| AppError::config(e.to_string()))?;

    if bootstrap(&ctx, &config.app.name, &config.bootstrap)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
    {
        tracing::info!("Seeded an empty store");
    }
    ctx.index().populate(ctx.storage()).await?;

    Ok(GatewayState::new(
        ctx,
        config.gateway.clone(),
        config.storage.max_upload_bytes(),
    ))
}

/// Serve on `listener` until the root token fires, then close every
/// connection within the configured deadline.
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<(), AppError> {
    let shutdown = state.shutdown().clone();

    let sweeper_state = state.clone();
    let sweeper_token = shutdown.clone();
    tokio::spawn(async move {
        sweeper_state
            .registry()
            .pending()
            .run_sweeper(SWEEP_INTERVAL, sweeper_token)
            .await;
    });

    let app = create_app(state.clone());
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    tracing::info!(
        connections = state.registry().connection_count(),
        "Closing remaining connections"
    );
    state.registry().close_all(state.config().close_timeout).await;
    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let shutdown = CancellationToken::new();
    let state = create_gateway_state(&config, shutdown.clone()).await?;

    let addr = config.server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::config(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal.cancel();
    });

    serve(listener, state).await
}
