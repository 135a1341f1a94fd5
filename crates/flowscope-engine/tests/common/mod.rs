#![allow(dead_code)]

use async_trait::async_trait;
use ethereum_types::{Address, H256};
use flowscope_core::error::Result;
use flowscope_core::traits::{HttpGetter, PendingTxFeed, PendingTxSubscription, RpcCaller, Sleeper};
use flowscope_core::{Error, HttpResponse, TransactionHash};
use flowscope_engine::swaps::{SWAP_V2_TOPIC, SWAP_V3_TOPIC};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn hash(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub fn hex_addr(a: &Address) -> String {
    format!("0x{:x}", a)
}

pub fn hex_hash(h: &H256) -> String {
    format!("0x{:x}", h)
}

// ---------------------------------------------------------------- HTTP

#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
    pub transport_error: bool,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into(), delay: Duration::ZERO, transport_error: false }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into(), delay: Duration::ZERO, transport_error: false }
    }

    pub fn error() -> Self {
        Self { status: 0, body: String::new(), delay: Duration::ZERO, transport_error: true }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// `HttpGetter` com respostas fixas por URL; URLs desconhecidas respondem 404
#[derive(Default)]
pub struct MockHttp {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: impl Into<String>, reply: Reply) {
        self.routes.lock().unwrap().insert(url.into(), reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl HttpGetter for MockHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        let reply = self.routes.lock().unwrap().get(url).cloned();
        let reply = match reply {
            Some(r) => r,
            None => return Ok(HttpResponse::new(404, "not found")),
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        if reply.transport_error {
            return Err(Error::HttpError("connection refused".to_string()));
        }
        Ok(HttpResponse::new(reply.status, reply.body.into_bytes()))
    }
}

// ---------------------------------------------------------------- RPC

type Handler = Box<dyn Fn(&str, &[Value]) -> Result<Value> + Send + Sync>;

/// `RpcCaller` guiado por closure, com contagem por método
pub struct MockRpc {
    handler: Handler,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    delay: Duration,
}

impl MockRpc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self { handler: Box::new(f), calls: Mutex::new(Vec::new()), delay: Duration::ZERO }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls_of(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(m, _)| m == method).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RpcCaller for MockRpc {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.calls.lock().unwrap().push((method.to_string(), params.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(method, &params)
    }
}

/// Bloco e recibos em memória
#[derive(Default, Clone)]
pub struct Chain {
    pub blocks: HashMap<String, Value>,
    pub receipts: HashMap<String, Value>,
    pub failing_receipts: Vec<String>,
    pub txs: HashMap<String, Value>,
}

impl Chain {
    pub fn into_rpc(self) -> MockRpc {
        MockRpc::new(move |method, params| {
            let key = params.first().and_then(Value::as_str).unwrap_or_default().to_string();
            match method {
                "eth_getBlockByNumber" => Ok(self.blocks.get(&key).cloned().unwrap_or(Value::Null)),
                "eth_getTransactionReceipt" => {
                    if self.failing_receipts.contains(&key) {
                        return Err(Error::RpcError("receipt unavailable".to_string()));
                    }
                    Ok(self.receipts.get(&key).cloned().unwrap_or(Value::Null))
                }
                "eth_getTransactionByHash" => Ok(self.txs.get(&key).cloned().unwrap_or(Value::Null)),
                "eth_blockNumber" => Ok(json!("0x10")),
                other => Err(Error::RpcError(format!("unexpected method {}", other))),
            }
        })
    }
}

pub fn block_json(number: &str, block_hash: H256, txs: &[(H256, Address)]) -> Value {
    let transactions: Vec<Value> = txs
        .iter()
        .map(|(h, from)| json!({ "hash": hex_hash(h), "from": hex_addr(from) }))
        .collect();
    json!({
        "number": number,
        "hash": hex_hash(&block_hash),
        "timestamp": "0x64",
        "transactions": transactions,
    })
}

pub fn swap_log(pool: Address, v3: bool) -> Value {
    let topic = if v3 { *SWAP_V3_TOPIC } else { *SWAP_V2_TOPIC };
    json!({ "address": hex_addr(&pool), "topics": [hex_hash(&topic)] })
}

pub fn other_log(pool: Address) -> Value {
    json!({ "address": hex_addr(&pool), "topics": [hex_hash(&hash(0xdead))] })
}

pub fn receipt_json(tx: H256, logs: Vec<Value>) -> Value {
    json!({ "transactionHash": hex_hash(&tx), "logs": logs })
}

pub fn pending_tx_json(n: u64) -> Value {
    json!({
        "hash": hex_hash(&hash(n)),
        "from": hex_addr(&addr(n)),
        "to": hex_addr(&addr(n + 1)),
        "value": "0x1",
        "gasPrice": "0x3b9aca00",
        "gas": "0x5208",
        "nonce": "0x0",
        "input": "0x"
    })
}

// ---------------------------------------------------------------- push feed

/// Cada `subscribe` consome uma sessão roteirizada; sem roteiro, a conexão falha
#[derive(Default)]
pub struct ScriptedFeed {
    sessions: Mutex<VecDeque<std::result::Result<Vec<TransactionHash>, String>>>,
    pub subscribes: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, hashes: Vec<TransactionHash>) {
        self.sessions.lock().unwrap().push_back(Ok(hashes));
    }

    pub fn failing(&self, msg: &str) {
        self.sessions.lock().unwrap().push_back(Err(msg.to_string()));
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

struct ScriptedSubscription {
    hashes: VecDeque<TransactionHash>,
}

#[async_trait]
impl PendingTxSubscription for ScriptedSubscription {
    async fn next_hash(&mut self) -> Result<Option<TransactionHash>> {
        Ok(self.hashes.pop_front())
    }
}

#[async_trait]
impl PendingTxFeed for ScriptedFeed {
    async fn subscribe(&self) -> Result<Box<dyn PendingTxSubscription>> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front();
        match next {
            Some(Ok(hashes)) => Ok(Box::new(ScriptedSubscription { hashes: hashes.into() })),
            Some(Err(msg)) => Err(Error::RpcError(msg)),
            None => Err(Error::RpcError("dial refused".to_string())),
        }
    }
}

// ---------------------------------------------------------------- sleeper

/// Registra cada espera e devolve na hora; publica a duração num canal
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
    tx: mpsc::UnboundedSender<Duration>,
}

impl RecordingSleeper {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Duration>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { slept: Mutex::new(Vec::new()), tx }, rx)
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        let _ = self.tx.send(duration);
        tokio::task::yield_now().await;
    }
}
