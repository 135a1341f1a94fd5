use std::env;
use std::time::Duration;

use anyhow::Context;
use flowscope_core::config::EngineConfig;
use flowscope_engine::Engine;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let limit: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10);
    let sandwich = args.get(2).map(|s| s == "--sandwich").unwrap_or(false);

    let config = EngineConfig::from_lookup(|k| env::var(k).ok());
    let engine = Engine::builder(config).build().context("configuração inválida")?;
    engine.start();

    // dá tempo para a mempool receber algo antes do snapshot
    tokio::time::sleep(Duration::from_secs(3)).await;

    let body = engine
        .snapshot(limit, sandwich, "latest")
        .await
        .context("falha ao montar snapshot")?;
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    info!(coverage = %value["coverage"], "snapshot pronto");
    println!("{}", serde_json::to_string_pretty(&value)?);

    let health = engine.check_health().await;
    println!("{}", serde_json::to_string_pretty(&health)?);

    engine.stop().await;
    Ok(())
}
