use anyhow::Result;
use fineup_server::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();
    let app = fineup_server::build(&config).await?;

    let addr = config.addr();
    tracing::info!(target: "fineup_server", %addr, container = %config.container, "listening");

    app.listen(addr).await?;

    Ok(())
}
