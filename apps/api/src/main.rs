use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic operations API server");

    let config = AppConfig::from_env();
    let addr: SocketAddr = config.bind_addr.parse()
        .with_context(|| format!("Invalid BIND_ADDR: {}", config.bind_addr))?;
    info!("Clinic calendar offset: {}", config.clinic_offset());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(config);

    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
