mod common;

use common::{hash, ScriptedFeed};
use flowscope_core::config::EngineConfig;
use flowscope_core::{Error, MempoolSource};
use flowscope_engine::{Engine, WatcherMode};
use std::collections::HashMap;
use std::sync::Arc;

#[test]
fn invalid_config_is_rejected() {
    let mut config = EngineConfig::default();
    config.relays.bases.clear();
    assert!(matches!(Engine::builder(config).build(), Err(Error::ValidationError(_))));

    let mut config = EngineConfig::default();
    config.watcher.capacity = 0;
    assert!(matches!(Engine::builder(config).build(), Err(Error::ValidationError(_))));
}

#[tokio::test]
async fn default_transports_from_environment_like_lookup() {
    let env: HashMap<&str, &str> = [
        ("RPC_HTTP_URL", "https://eth-mainnet.g.alchemy.com/v2/secret"),
        ("RELAY_URLS", "https://relay-a.example, https://relay-b.example"),
        ("SNAPSHOT_TTL_SECONDS", "12"),
    ]
    .into_iter()
    .collect();
    let config = EngineConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

    let engine = Engine::builder(config).build().unwrap();
    assert_eq!(engine.config().relays.bases.len(), 2);
    assert_eq!(engine.relays().client().bases()[1], "https://relay-b.example");
    assert_eq!(engine.sources().rpc_http, "https://eth-mainnet.g.alchemy.com/v2/[REDACTED]");
    assert_eq!(engine.sources().rpc_ws, "");
    assert_eq!(engine.mempool().source, MempoolSource::Poll);
}

#[tokio::test]
async fn injected_feed_selects_push_mode() {
    let feed = Arc::new(ScriptedFeed::new());
    feed.session(vec![hash(1)]);
    let engine = Engine::builder(EngineConfig::default())
        .pending_feed(feed)
        .build()
        .unwrap();
    assert_eq!(engine.mempool().source, MempoolSource::Push);
    assert_eq!(engine.mempool().count, 0);

    let mut config = EngineConfig::default();
    config.rpc.ws_url = Some("wss://node.example/ws".into());
    let engine = Engine::builder(config.clone()).without_pending_feed().build().unwrap();
    assert_eq!(engine.mempool().source, MempoolSource::Poll);

    config.watcher.disabled = true;
    let engine = Engine::builder(config).build().unwrap();
    assert_eq!(engine.mempool().source, WatcherMode::Disabled.source());
}
