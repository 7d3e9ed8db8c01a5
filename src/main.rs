use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transfer_backend::config::AppConfig;
use transfer_backend::services::reaper::RetentionReaper;
use transfer_backend::{AppState, create_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transfer_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Transfer Backend...");

    let config = AppConfig::from_env();
    info!(
        "⚙️  Config: storage={}, retention={}d, sweep every {}s",
        config.storage_dir.display(),
        config.retention_days,
        config.sweep_interval_secs
    );

    let state = AppState::new(config.clone());
    state.storage.ensure_root().await?;

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Start Retention Reaper
    let reaper = RetentionReaper::new(
        state.registry.clone(),
        config.sweep_interval(),
        shutdown_rx,
    );
    tokio::spawn(async move {
        reaper.run().await;
    });

    let body_limit = match config.max_file_size {
        Some(max) => axum::extract::DefaultBodyLimit::max(max),
        None => axum::extract::DefaultBodyLimit::disable(),
    };

    let app = create_app(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(CorsLayer::permissive())
        .layer(body_limit);

    let addr: SocketAddr = config.bind_addr.parse()?;
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
