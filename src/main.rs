use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("CAREGATE_HTTP_PORT").unwrap_or_else(|_| "7878".to_string());
    let ttl_secs = std::env::var("CAREGATE_SESSION_TTL_SECS").unwrap_or_else(|_| "259200".to_string());
    let broker_url = std::env::var("CAREGATE_BROKER_URL").unwrap_or_else(|_| "<in-process>".to_string());
    info!(
        target: "caregate",
        "caregate starting: RUST_LOG='{}', http_port={}, session_ttl_secs={}, broker='{}'",
        rust_log, http_port, ttl_secs, broker_url
    );

    caregate::server::run().await
}
