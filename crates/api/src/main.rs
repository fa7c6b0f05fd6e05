use std::sync::Arc;

use anyhow::Context;

use agencyledger_api::{app, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    agencyledger_observability::init(config.log_format);
    if config.uses_dev_secret() {
        tracing::warn!("SESSION_SECRET not set; using insecure dev default");
    }

    let services = app::AppServices::from_config(&config)
        .await
        .context("failed to build services")?;
    let app = app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
