use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use notebook_sharing::config::{PublishingConfig, ServerSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid RUST_LOG filter")?;
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "notebook-sharing", "RUST_LOG='{}'", rust_log);

    let settings = ServerSettings::from_env().context("reading server settings")?;
    let config = PublishingConfig::from_env().context("reading publishing service settings")?;
    notebook_sharing::server::run(settings, config).await
}
