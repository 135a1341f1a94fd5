mod common;

use common::{hash, hex_hash, pending_tx_json, Chain, MockRpc, RecordingSleeper, ScriptedFeed};
use ethereum_types::U256;
use flowscope_core::config::WatcherConfig;
use flowscope_core::traits::PendingTxFeed;
use flowscope_core::{Error, MempoolSource, SourceKind};
use flowscope_engine::{MempoolWatcher, SourceHealth, WatcherMode};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn health() -> Arc<SourceHealth> {
    Arc::new(SourceHealth::new(SourceKind::Mempool))
}

fn chain_with_txs(ns: impl IntoIterator<Item = u64>) -> Chain {
    let mut chain = Chain::default();
    for n in ns {
        chain.txs.insert(hex_hash(&hash(n)), pending_tx_json(n));
    }
    chain
}

#[tokio::test]
async fn disabled_mode_uses_placeholders_and_spawns_nothing() {
    let config = WatcherConfig { disabled: true, ..WatcherConfig::default() };
    let rpc = Arc::new(MockRpc::new(|_, _| Ok(Value::Null)));
    let feed: Arc<dyn PendingTxFeed> = Arc::new(ScriptedFeed::new());
    let watcher = MempoolWatcher::new(config, rpc.clone(), Some(feed), health());

    assert_eq!(watcher.mode(), WatcherMode::Disabled);
    watcher.start();
    assert!(!watcher.is_running());

    let snap = watcher.current_snapshot();
    assert_eq!(snap.source, MempoolSource::Disabled);
    assert_eq!(snap.count, 10);
    assert_eq!(snap.pending_txs[0].hash, hash(1));
    assert_eq!(rpc.total_calls(), 0);

    watcher.stop().await;
}

#[tokio::test]
async fn push_keeps_latest_first_within_capacity() {
    let chain = chain_with_txs((1..=12).filter(|n| *n != 5));
    let rpc = Arc::new(chain.into_rpc());
    let feed = Arc::new(ScriptedFeed::new());
    feed.session((1..=12).map(hash).collect());
    let (sleeper, mut slept) = RecordingSleeper::new();

    let watcher = MempoolWatcher::new(
        WatcherConfig::default(),
        rpc.clone(),
        Some(feed.clone() as Arc<dyn PendingTxFeed>),
        health(),
    )
    .with_sleeper(Arc::new(sleeper));
    assert_eq!(watcher.mode(), WatcherMode::Push);
    watcher.start();

    // a primeira espera só acontece quando a sessão roteirizada termina
    slept.recv().await.unwrap();
    let snap = watcher.current_snapshot();
    watcher.stop().await;
    assert!(!watcher.is_running());

    assert_eq!(snap.source, MempoolSource::Push);
    assert_eq!(snap.count, 10);
    let got: Vec<_> = snap.pending_txs.iter().map(|t| t.hash).collect();
    let expected: Vec<_> = [12, 11, 10, 9, 8, 7, 6, 4, 3, 2].into_iter().map(hash).collect();
    assert_eq!(got, expected);
    assert!(snap.last_update > 0);
    assert_eq!(rpc.calls_of("eth_getTransactionByHash"), 12);
}

#[tokio::test]
async fn reconnect_backoff_doubles_and_resets_after_delivery() {
    let rpc = Arc::new(chain_with_txs([1]).into_rpc());
    let feed = Arc::new(ScriptedFeed::new());
    feed.failing("refused");
    feed.failing("refused");
    feed.failing("refused");
    feed.session(vec![hash(1)]);
    let (sleeper, mut slept) = RecordingSleeper::new();

    let config = WatcherConfig {
        reconnect_base: Duration::from_secs(1),
        reconnect_max: Duration::from_secs(8),
        ..WatcherConfig::default()
    };
    let mempool_health = health();
    let watcher = MempoolWatcher::new(
        config,
        rpc,
        Some(feed.clone() as Arc<dyn PendingTxFeed>),
        mempool_health.clone(),
    )
    .with_sleeper(Arc::new(sleeper));
    watcher.start();

    let mut delays = Vec::new();
    while delays.len() < 8 {
        delays.push(slept.recv().await.unwrap().as_secs());
    }
    watcher.stop().await;

    assert_eq!(delays, vec![1, 2, 4, 1, 2, 4, 8, 8]);
    assert!(feed.subscribe_count() >= 8);
    assert!(!mempool_health.is_healthy());
    assert_eq!(watcher.current_snapshot().pending_txs[0].hash, hash(1));
}

#[tokio::test]
async fn poll_once_replaces_buffer_and_keeps_it_on_empty_block() {
    let pending = Arc::new(Mutex::new(json!({
        "transactions": (1..=15).map(pending_tx_json).collect::<Vec<_>>()
    })));
    let state = pending.clone();
    let rpc = Arc::new(MockRpc::new(move |method, params| {
        assert_eq!(method, "eth_getBlockByNumber");
        assert_eq!(params, &[json!("pending"), json!(true)]);
        Ok(state.lock().unwrap().clone())
    }));
    let watcher = MempoolWatcher::new(WatcherConfig::default(), rpc, None, health());
    assert_eq!(watcher.mode(), WatcherMode::Poll);

    assert_eq!(watcher.poll_once().await.unwrap(), 10);
    let snap = watcher.current_snapshot();
    assert_eq!(snap.source, MempoolSource::Poll);
    assert_eq!(snap.count, 10);
    assert_eq!(snap.pending_txs[0].hash, hash(1));
    assert_eq!(snap.pending_txs[0].gas_price, Some(U256::from(1_000_000_000u64)));

    *pending.lock().unwrap() = json!({ "transactions": [] });
    assert_eq!(watcher.poll_once().await.unwrap(), 0);
    assert_eq!(watcher.current_snapshot(), snap);

    *pending.lock().unwrap() = Value::Null;
    assert_eq!(watcher.poll_once().await.unwrap(), 0);
    assert_eq!(watcher.current_snapshot().count, 10);
}

#[tokio::test]
async fn poll_failure_marks_unhealthy() {
    let rpc = Arc::new(MockRpc::new(|_, _| Err(Error::TimeoutError("rpc lento".into()))));
    let h = health();
    let watcher = MempoolWatcher::new(WatcherConfig::default(), rpc, None, h.clone());

    assert!(watcher.poll_once().await.is_err());
    assert!(!h.is_healthy());
    assert!(watcher.current_snapshot().pending_txs.is_empty());
}

#[tokio::test]
async fn poll_loop_runs_until_stopped() {
    let rpc = Arc::new(MockRpc::new(|_, _| Ok(json!({ "transactions": [pending_tx_json(7)] }))));
    let (sleeper, mut slept) = RecordingSleeper::new();
    let config = WatcherConfig { poll_interval: Duration::from_secs(5), ..WatcherConfig::default() };
    let watcher = MempoolWatcher::new(config, rpc.clone(), None, health()).with_sleeper(Arc::new(sleeper));

    watcher.start();
    watcher.start();
    assert_eq!(slept.recv().await.unwrap(), Duration::from_secs(5));
    assert!(rpc.calls_of("eth_getBlockByNumber") >= 1);
    assert_eq!(watcher.current_snapshot().pending_txs[0].hash, hash(7));

    watcher.stop().await;
    assert!(!watcher.is_running());
    // stop repetido é inofensivo
    watcher.stop().await;
}
