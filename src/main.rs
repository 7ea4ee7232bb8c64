use avatar_backend::config::AppConfig;
use avatar_backend::infrastructure::{records, storage};
use avatar_backend::services::storage::BlobStore;
use avatar_backend::services::worker::BackgroundWorker;
use avatar_backend::{AppState, create_app};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Avatar Backend [Mode: {}]...", args.mode);

    // 2. Setup Common Infrastructure
    let config = AppConfig::from_env();
    info!(
        "🛡️  Upload Policy: Max Size={} bytes, Content-Type={}*, Grant TTL={}s, Records={:?}",
        config.max_upload_size,
        config.content_type_prefix,
        config.grant_expiry_secs,
        config.record_backend
    );

    let blobs: Arc<dyn BlobStore> = storage::setup_storage().await?;
    let record_store = records::setup_records(&config).await?;

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Initialize Worker Service
    if args.mode == "worker" || args.mode == "all" {
        if config.enable_orphan_sweep {
            let worker = BackgroundWorker::new(
                blobs.clone(),
                record_store.clone(),
                config.clone(),
                shutdown_rx.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
            info!("👷 Orphan sweeper initialized.");
        } else {
            info!("👷 Orphan sweeper disabled (ENABLE_ORPHAN_SWEEP=false).");
        }
    }

    // 5. Initialize API Service
    if args.mode == "api" || args.mode == "all" {
        let state = AppState::new(blobs.clone(), record_store.clone(), config.clone());

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
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
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for Shutdown Signal and notify the worker
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down avatar services...");
    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Backend exited cleanly.");
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
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
