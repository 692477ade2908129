use anyhow::Context;

use reqflow_infra::config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    reqflow_observability::init();

    let config = EngineConfig::from_env();
    let bind_addr = config.bind_addr;

    let app = reqflow_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
