use anyhow::Context;

use kluster_api::app::{self, services};
use kluster_infra::config::AppSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kluster_observability::init();

    let settings = AppSettings::load().await.context("failed to load settings")?;
    let (services, background) = services::build_services(&settings, services::Overrides::default()).await?;
    let app = app::build_app(services, &settings.cors);

    let address = settings.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    background.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(err) => tracing::error!(error = %err, "failed to listen for ctrl-c"),
    }
}
