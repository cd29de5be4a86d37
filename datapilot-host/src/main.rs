use std::sync::Arc;

use datapilot_core::{ClientConfig, HttpGateway, JsonFileStore, Renderer, Session, SessionStore};
use tokio::io::{stdin, stdout, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bridge;

use bridge::Bridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the bridge protocol, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datapilot_host=debug,datapilot_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting DataPilot host v0.1.0");

    let config = ClientConfig::from_env()?;
    let gateway = Arc::new(HttpGateway::new(&config.api_base, config.request_timeout)?);
    let store = SessionStore::new(
        JsonFileStore::open(&config.store_path),
        config.persist_datasets,
    );
    let session = Session::new(store);
    let renderer = Renderer::new(config.decoration);

    let mut bridge = Bridge::new(session, renderer, gateway, stdout());
    bridge.start().await?;

    info!("DataPilot host started successfully");

    bridge.run(BufReader::new(stdin())).await?;

    info!("DataPilot host shutdown complete");
    Ok(())
}
