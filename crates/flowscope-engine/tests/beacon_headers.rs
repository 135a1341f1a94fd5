mod common;

use common::{Chain, MockHttp, Reply};
use flowscope_core::config::EngineConfig;
use flowscope_core::Error;
use flowscope_engine::consensus::PATH_HEADERS;
use flowscope_engine::relay::delivered_path;
use flowscope_engine::Engine;
use serde_json::json;
use std::sync::Arc;
use tokio_test::assert_ok;

const RELAY: &str = "http://relay.test";
const BEACON: &str = "http://beacon.test";

fn engine(http: Arc<MockHttp>) -> Engine {
    let mut config = EngineConfig::default();
    config.relays.bases = vec![RELAY.to_string()];
    config.consensus.base = BEACON.to_string();
    config.watcher.disabled = true;
    Engine::builder(config)
        .rpc(Arc::new(Chain::default().into_rpc()))
        .http_getter(http)
        .build()
        .unwrap()
}

fn headers_url() -> String {
    format!("{}{}?limit=20", BEACON, PATH_HEADERS)
}

fn beacon_body() -> String {
    json!({"data": [
        {"header": {"message": {"slot": "300", "proposer_index": "11"}}},
        {"header": {"message": {"slot": "299", "proposer_index": "12"}}}
    ]})
    .to_string()
}

#[tokio::test]
async fn headers_carry_builder_payment_of_matching_slot() {
    let http = Arc::new(MockHttp::new());
    http.route(headers_url(), Reply::ok(beacon_body()));
    http.route(
        format!("{}{}", RELAY, delivered_path(50)),
        Reply::ok(json!([{"slot": "299", "value": "42", "builder_pubkey": "0xb1"}]).to_string()),
    );
    let engine = engine(http);

    let view = assert_ok!(engine.beacon_headers().await);
    assert_eq!(view["count"], 2);
    assert_eq!(view["headers"][0]["slot"], "300");
    assert!(view["headers"][0].get("builder_payment_eth").is_none());
    assert_eq!(view["headers"][1]["proposer_index"], "12");
    assert_eq!(view["headers"][1]["builder_payment_eth"], "42");
    assert_eq!(view["headers"][1]["builder_pubkey"], "0xb1");
}

#[tokio::test]
async fn relay_outage_leaves_headers_without_payment() {
    let http = Arc::new(MockHttp::new());
    http.route(headers_url(), Reply::ok(beacon_body()));
    http.route(format!("{}{}", RELAY, delivered_path(50)), Reply::error());
    let engine = engine(http);

    let view = assert_ok!(engine.beacon_headers().await);
    assert_eq!(view["count"], 2);
    assert!(view["headers"][1].get("builder_payment_eth").is_none());
}

#[tokio::test]
async fn consensus_failure_is_an_error() {
    let http = Arc::new(MockHttp::new());
    http.route(headers_url(), Reply::status(429, "rate limited"));
    let engine = engine(http);

    assert!(matches!(engine.beacon_headers().await, Err(Error::HttpError(_))));
}
