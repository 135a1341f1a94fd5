//! Observador da mempool: buffer das transações pendentes mais recentes
//!
//! O modo é escolhido uma vez em `start`:
//! - `Disabled`: preenche o buffer com transações fictícias e não cria tarefa
//! - `Push`: assina `newPendingTransactions` e busca cada hash notificado
//! - `Poll`: lê o bloco `pending` a cada intervalo

use crate::backoff::{Backoff, LogThrottle};
use crate::health::SourceHealth;
use chrono::Utc;
use ethereum_types::{Address, H256, U256};
use flowscope_core::config::WatcherConfig;
use flowscope_core::error::Result;
use flowscope_core::traits::{PendingTxFeed, RpcCaller, Sleeper, TokioSleeper};
use flowscope_core::utils::format_h256;
use flowscope_core::{Error, MempoolSnapshot, MempoolSource, PendingTx, TransactionHash};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherMode {
    Disabled,
    Push,
    Poll,
}

impl WatcherMode {
    pub fn source(&self) -> MempoolSource {
        match self {
            WatcherMode::Disabled => MempoolSource::Disabled,
            WatcherMode::Push => MempoolSource::Push,
            WatcherMode::Poll => MempoolSource::Poll,
        }
    }
}

/// Buffer limitado, mais recentes primeiro
#[derive(Debug, Clone)]
pub struct PendingBuffer {
    capacity: usize,
    txs: Vec<PendingTx>,
    last_update: i64,
    source: MempoolSource,
}

impl PendingBuffer {
    pub fn new(capacity: usize, source: MempoolSource) -> Self {
        Self { capacity, txs: Vec::with_capacity(capacity), last_update: 0, source }
    }

    /// Insere na frente e descarta o excedente mais antigo
    pub fn push_front(&mut self, tx: PendingTx) {
        self.last_update = tx.observed_at;
        self.txs.insert(0, tx);
        self.txs.truncate(self.capacity);
    }

    /// Substitui o conteúdo inteiro
    pub fn replace(&mut self, mut txs: Vec<PendingTx>, now: i64) {
        txs.truncate(self.capacity);
        self.txs = txs;
        self.last_update = now;
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn snapshot(&self) -> MempoolSnapshot {
        MempoolSnapshot {
            pending_txs: self.txs.clone(),
            count: self.txs.len(),
            last_update: self.last_update,
            source: self.source,
        }
    }
}

/// Transações fictícias exibidas com o monitoramento desativado
pub fn placeholder_txs(count: usize, now: i64) -> Vec<PendingTx> {
    let eth = U256::exp10(18);
    (0..count as u64)
        .map(|i| PendingTx {
            hash: H256::from_low_u64_be(i + 1),
            from: Address::from_low_u64_be(i * 1000),
            to: Some(Address::from_low_u64_be(i * 2000)),
            value: U256::from(i + 1) * eth,
            gas_price: None,
            gas: None,
            nonce: U256::zero(),
            input: String::new(),
            observed_at: now - (i as i64) * 10,
        })
        .collect()
}

#[derive(Deserialize)]
struct PendingBlock {
    #[serde(default)]
    transactions: Vec<PendingTx>,
}

struct WatcherInner {
    config: WatcherConfig,
    rpc: Arc<dyn RpcCaller>,
    sleeper: Arc<dyn Sleeper>,
    buffer: RwLock<PendingBuffer>,
    health: Arc<SourceHealth>,
}

/// Resultado de uma sessão push
struct SessionOutcome {
    delivered: usize,
    error: Error,
}

impl WatcherInner {
    fn ingest(&self, tx: PendingTx) {
        self.buffer.write().push_front(tx);
        self.health.record_success();
    }

    async fn lookup(&self, hash: TransactionHash) -> Result<Option<PendingTx>> {
        let raw = self
            .rpc
            .call("eth_getTransactionByHash", vec![json!(format_h256(&hash))])
            .await?;
        if raw.is_null() {
            return Ok(None);
        }
        let mut tx: PendingTx = serde_json::from_value(raw)?;
        tx.observed_at = Utc::now().timestamp();
        Ok(Some(tx))
    }

    async fn push_session(&self, feed: &dyn PendingTxFeed) -> SessionOutcome {
        let mut delivered = 0usize;
        let mut sub = match feed.subscribe().await {
            Ok(s) => s,
            Err(error) => return SessionOutcome { delivered, error },
        };
        debug!("sessão de pendentes aberta");

        loop {
            match sub.next_hash().await {
                Ok(Some(hash)) => match self.lookup(hash).await {
                    Ok(Some(tx)) => {
                        self.ingest(tx);
                        delivered += 1;
                    }
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "falha ao buscar transação pendente"),
                },
                Ok(None) => {
                    let error = Error::RpcError("sessão encerrada pelo servidor".to_string());
                    return SessionOutcome { delivered, error };
                }
                Err(error) => return SessionOutcome { delivered, error },
            }
        }
    }

    async fn poll_once(&self) -> Result<usize> {
        let result = self
            .rpc
            .call("eth_getBlockByNumber", vec![json!("pending"), json!(true)])
            .await
            .and_then(|raw| match raw {
                Value::Null => Ok(PendingBlock { transactions: Vec::new() }),
                other => Ok(serde_json::from_value::<PendingBlock>(other)?),
            });

        let block = match result {
            Ok(b) => b,
            Err(e) => {
                self.health.record_error(e.to_string());
                return Err(e);
            }
        };
        if block.transactions.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().timestamp();
        let txs: Vec<PendingTx> = block
            .transactions
            .into_iter()
            .take(self.config.capacity)
            .map(|mut tx| {
                tx.observed_at = now;
                tx
            })
            .collect();
        let count = txs.len();
        self.buffer.write().replace(txs, now);
        self.health.record_success();
        Ok(count)
    }
}

async fn run_push(inner: Arc<WatcherInner>, feed: Arc<dyn PendingTxFeed>, mut shutdown: watch::Receiver<bool>) {
    let mut backoff = Backoff::new(inner.config.reconnect_base, inner.config.reconnect_max);
    let mut throttle = LogThrottle::new(inner.config.reconnect_log_interval);

    loop {
        let outcome = tokio::select! {
            o = inner.push_session(feed.as_ref()) => o,
            _ = shutdown.changed() => break,
        };

        inner.health.record_error(outcome.error.to_string());
        if outcome.delivered > 0 {
            backoff.reset();
        }
        let delay = backoff.next_delay();
        if throttle.allow() {
            warn!(error = %outcome.error, delivered = outcome.delivered, delay_ms = delay.as_millis() as u64, "mempool: reconectando");
        } else {
            debug!(error = %outcome.error, delay_ms = delay.as_millis() as u64, "mempool: reconectando");
        }

        tokio::select! {
            _ = inner.sleeper.sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }
    debug!("mempool: loop push encerrado");
}

async fn run_poll(inner: Arc<WatcherInner>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let polled = tokio::select! {
            r = inner.poll_once() => r,
            _ = shutdown.changed() => break,
        };
        match polled {
            Ok(0) => debug!("mempool: bloco pending vazio"),
            Ok(n) => debug!(count = n, "mempool: pendentes atualizadas"),
            Err(e) => warn!(error = %e, "mempool: falha ao ler bloco pending"),
        }

        tokio::select! {
            _ = inner.sleeper.sleep(inner.config.poll_interval) => {}
            _ = shutdown.changed() => break,
        }
    }
    debug!("mempool: loop polling encerrado");
}

/// Observador da mempool com ciclo de vida explícito
pub struct MempoolWatcher {
    inner: Arc<WatcherInner>,
    feed: Option<Arc<dyn PendingTxFeed>>,
    control: Mutex<Option<(watch::Sender<bool>, Option<JoinHandle<()>>)>>,
}

impl MempoolWatcher {
    /// `feed` ausente seleciona o modo polling
    pub fn new(
        config: WatcherConfig,
        rpc: Arc<dyn RpcCaller>,
        feed: Option<Arc<dyn PendingTxFeed>>,
        health: Arc<SourceHealth>,
    ) -> Self {
        let mode = Self::resolve_mode(&config, feed.is_some());
        let buffer = PendingBuffer::new(config.capacity, mode.source());
        Self {
            inner: Arc::new(WatcherInner {
                config,
                rpc,
                sleeper: Arc::new(TokioSleeper),
                buffer: RwLock::new(buffer),
                health,
            }),
            feed,
            control: Mutex::new(None),
        }
    }

    /// Substitui o sleeper; só tem efeito antes de `start`
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.sleeper = sleeper;
        }
        self
    }

    fn resolve_mode(config: &WatcherConfig, has_feed: bool) -> WatcherMode {
        if config.disabled {
            WatcherMode::Disabled
        } else if has_feed {
            WatcherMode::Push
        } else {
            WatcherMode::Poll
        }
    }

    pub fn mode(&self) -> WatcherMode {
        Self::resolve_mode(&self.inner.config, self.feed.is_some())
    }

    /// Inicia o modo escolhido. Chamadas repetidas são ignoradas.
    ///
    /// Os modos push e polling exigem um runtime tokio ativo.
    pub fn start(&self) {
        let mut control = self.control.lock();
        if control.is_some() {
            return;
        }

        let (tx, rx) = watch::channel(false);
        let handle = match (self.mode(), self.feed.clone()) {
            (WatcherMode::Disabled, _) => {
                let now = Utc::now().timestamp();
                let txs = placeholder_txs(self.inner.config.capacity, now);
                self.inner.buffer.write().replace(txs, now);
                info!("mempool: monitoramento desativado; usando dados de demonstração");
                None
            }
            (WatcherMode::Push, Some(feed)) => {
                info!("mempool: iniciando assinatura de pendentes");
                Some(tokio::spawn(run_push(self.inner.clone(), feed, rx)))
            }
            _ => {
                info!(interval_ms = self.inner.config.poll_interval.as_millis() as u64, "mempool: iniciando polling do bloco pending");
                Some(tokio::spawn(run_poll(self.inner.clone(), rx)))
            }
        };
        *control = Some((tx, handle));
    }

    /// Sinaliza o encerramento e aguarda a tarefa
    pub async fn stop(&self) {
        let taken = self.control.lock().take();
        if let Some((tx, Some(handle))) = taken {
            let _ = tx.send(true);
            if let Err(e) = handle.await {
                warn!(error = %e, "mempool: tarefa terminou com erro");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .as_ref()
            .and_then(|(_, h)| h.as_ref())
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cópia do buffer atual
    pub fn current_snapshot(&self) -> MempoolSnapshot {
        self.inner.buffer.read().snapshot()
    }

    /// Uma leitura do bloco `pending`; 0 quando o bloco vem vazio e o buffer é mantido
    pub async fn poll_once(&self) -> Result<usize> {
        self.inner.poll_once().await
    }

    pub fn health(&self) -> &Arc<SourceHealth> {
        &self.inner.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u64) -> PendingTx {
        let mut t = placeholder_txs(1, n as i64).remove(0);
        t.hash = H256::from_low_u64_be(n);
        t
    }

    #[test]
    fn buffer_keeps_most_recent_first() {
        let mut buf = PendingBuffer::new(3, MempoolSource::Push);
        for n in 1..=5 {
            buf.push_front(tx(n));
        }
        let snap = buf.snapshot();
        assert_eq!(snap.count, 3);
        let hashes: Vec<H256> = snap.pending_txs.iter().map(|t| t.hash).collect();
        assert_eq!(hashes, vec![H256::from_low_u64_be(5), H256::from_low_u64_be(4), H256::from_low_u64_be(3)]);
        assert_eq!(snap.last_update, 5);
    }

    #[test]
    fn placeholder_shape() {
        let txs = placeholder_txs(10, 1_000);
        assert_eq!(txs.len(), 10);
        assert_eq!(txs[0].hash, H256::from_low_u64_be(1));
        assert_eq!(txs[3].from, Address::from_low_u64_be(3000));
        assert_eq!(txs[3].to, Some(Address::from_low_u64_be(6000)));
        assert_eq!(txs[1].value, U256::from(2) * U256::exp10(18));
        assert_eq!(txs[9].observed_at, 910);
    }
}
