use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_server::config::UploadConfig;
use upload_server::{AppState, create_app};

/// Concurrent multi-file upload server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Address to listen on (overrides LISTEN_ADDR)
    #[arg(long)]
    listen: Option<String>,

    /// Directory uploads are written to and served from (overrides UPLOAD_ROOT)
    #[arg(long)]
    upload_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("🚀 Starting upload server...");

    let mut config = UploadConfig::from_env();
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(upload_root) = cli.upload_root {
        config.upload_root = upload_root;
    }

    info!(
        "Upload Config: Root={}, Max Size={}MB, Buffer={}B, Writers={}, Rollback={}",
        config.upload_root.display(),
        config.max_upload_size / 1024 / 1024,
        config.copy_buffer_size,
        config.max_concurrent_writes,
        config.rollback_on_failure
    );

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config);

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
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
                info!("{} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("✅ Server ready at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown...");
        },
    }
}
