//! Cluster explorer entry point.

use sfx_core::ExplorerConfig;
use sfx_explorer::app::App;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = ExplorerConfig::load()?;
    tracing::info!(
        cluster = %config.cluster.name,
        endpoint = %config.cluster.endpoint,
        auto_refresh = config.refresh.auto_refresh,
        "starting explorer"
    );

    let app = App::connect(&config)?;
    let mut stdout = std::io::stdout();
    app.run(&mut stdout).await?;
    Ok(())
}
