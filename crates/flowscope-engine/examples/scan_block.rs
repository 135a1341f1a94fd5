use std::env;

use anyhow::Context;
use flowscope_core::config::EngineConfig;
use flowscope_engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let tag = args.get(1).cloned().unwrap_or_else(|| "latest".to_string());

    let mut config = EngineConfig::from_lookup(|k| env::var(k).ok());
    config.watcher.disabled = true;
    let engine = Engine::builder(config).build()?;

    let report = engine
        .scan_sandwiches(&tag)
        .await
        .with_context(|| format!("falha ao analisar bloco {}", tag))?;

    println!("Bloco {} ({} swaps)", report.block, report.swap_count);
    for s in &report.sandwiches {
        println!(
            "  pool {:?}: atacante {:?} -> vítima {:?} ({:?})",
            s.pool, s.attacker, s.victim, s.victim_tx
        );
    }
    if report.sandwiches.is_empty() {
        println!("  nenhum sandwich encontrado");
    }
    Ok(())
}
