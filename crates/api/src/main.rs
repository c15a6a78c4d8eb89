use anyhow::Context;

use siteforge_api::ApiConfig;
use siteforge_api::app::{self, InMemoryBackends};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    siteforge_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;

    // Dev wiring: in-memory store, blob storage and auth provider.
    let backends = InMemoryBackends::new();
    let app = app::build_app(&config, backends.services(&config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
