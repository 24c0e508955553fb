use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("GATEHOUSE_HTTP_PORT").unwrap_or_else(|_| "19999".to_string());
    let data_file = std::env::var("GATEHOUSE_DATA_FILE").unwrap_or_else(|_| "data/credentials.json".to_string());
    info!(
        target: "gatehouse",
        "Gatehouse starting: RUST_LOG='{}', http_port={}, data_file='{}'",
        rust_log, http_port, data_file
    );

    gatehouse::server::run().await
}
