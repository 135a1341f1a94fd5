//! Montagem do motor completo a partir da configuração

use crate::consensus::{ConsensusClient, PATH_HEADERS};
use crate::failover::FailoverClient;
use crate::health::{HealthRegistry, TrackedRpc};
use crate::mempool::MempoolWatcher;
use crate::probe::{HealthProbe, OverallHealth};
use crate::relay::{enrich_headers, RelayViews};
use crate::sandwich::SandwichScanner;
use crate::snapshot::{SharedScanner, SnapshotCompositor};
use crate::sources::SourcesInfo;
use crate::swaps::SwapExtractor;
use crate::tracker::{TxTrack, TxTracker};
use bytes::Bytes;
use flowscope_core::config::EngineConfig;
use flowscope_core::error::Result;
use flowscope_core::traits::{HttpGetter, PendingTxFeed, RpcCaller, Sleeper};
use flowscope_core::{MempoolSnapshot, SandwichReport, SourceKind};
use flowscope_rpc::{JsonRpcClient, ReqwestGetter, WsPendingFeed};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Cabeçalhos do consenso pedidos por chamada
const BEACON_HEADERS_LIMIT: usize = 20;

/// Janela de lances entregues usada para casar slots
const HEADER_BID_WINDOW: usize = 50;

/// Builder do motor; transportes não informados são criados a partir da configuração
pub struct EngineBuilder {
    config: EngineConfig,
    rpc: Option<Arc<dyn RpcCaller>>,
    http: Option<Arc<dyn HttpGetter>>,
    feed: Option<Option<Arc<dyn PendingTxFeed>>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, rpc: None, http: None, feed: None, sleeper: None }
    }

    /// Define o transporte JSON-RPC
    pub fn rpc(mut self, rpc: Arc<dyn RpcCaller>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    /// Define o transporte HTTP usado por relays e consenso
    pub fn http_getter(mut self, http: Arc<dyn HttpGetter>) -> Self {
        self.http = Some(http);
        self
    }

    /// Define a fonte push da mempool
    pub fn pending_feed(mut self, feed: Arc<dyn PendingTxFeed>) -> Self {
        self.feed = Some(Some(feed));
        self
    }

    /// Força o modo polling mesmo com `ws_url` configurada
    pub fn without_pending_feed(mut self) -> Self {
        self.feed = Some(None);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Valida a configuração e conecta os componentes
    pub fn build(self) -> Result<Engine> {
        let config = self.config;
        config.validate()?;

        let health = HealthRegistry::new();

        let raw_rpc: Arc<dyn RpcCaller> = match self.rpc {
            Some(r) => r,
            None => Arc::new(JsonRpcClient::new(&config.rpc)?),
        };
        let rpc: Arc<dyn RpcCaller> = Arc::new(TrackedRpc::new(raw_rpc, health.get(SourceKind::Rpc)));

        let (relay_http, beacon_http): (Arc<dyn HttpGetter>, Arc<dyn HttpGetter>) = match self.http {
            Some(h) => (h.clone(), h),
            None => (
                Arc::new(ReqwestGetter::new(config.relays.request_timeout)?),
                Arc::new(ReqwestGetter::new(config.consensus.request_timeout)?),
            ),
        };

        let failover = Arc::new(FailoverClient::new(&config.relays, relay_http, health.get(SourceKind::Relay)));
        let relays = RelayViews::new(failover.clone());
        let consensus = Arc::new(ConsensusClient::new(&config.consensus, beacon_http, health.get(SourceKind::Beacon)));

        let feed = self.feed.unwrap_or_else(|| {
            config
                .rpc
                .ws_url
                .clone()
                .map(|url| Arc::new(WsPendingFeed::new(url)) as Arc<dyn PendingTxFeed>)
        });
        let mut watcher = MempoolWatcher::new(config.watcher.clone(), rpc.clone(), feed, health.get(SourceKind::Mempool));
        if let Some(sleeper) = self.sleeper {
            watcher = watcher.with_sleeper(sleeper);
        }
        let watcher = Arc::new(watcher);

        let scanner: SharedScanner = Arc::new(SandwichScanner::new(SwapExtractor::new(rpc.clone(), config.scan.clone())));
        let sources = SourcesInfo::from_config(&config);

        let compositor = SnapshotCompositor::new(
            config.snapshot.clone(),
            relays.clone(),
            consensus.clone(),
            watcher.clone(),
            scanner.clone(),
            sources.clone(),
        );
        let probe = HealthProbe::new(health.clone(), consensus.clone(), failover, rpc.clone(), watcher.clone());
        let tracker = TxTracker::new(rpc.clone(), relays.clone(), consensus.clone());

        Ok(Engine {
            config,
            health,
            rpc,
            relays,
            consensus,
            watcher,
            scanner,
            compositor,
            probe,
            tracker,
            sources,
        })
    }
}

/// Fachada sobre os componentes do motor
pub struct Engine {
    config: EngineConfig,
    health: HealthRegistry,
    rpc: Arc<dyn RpcCaller>,
    relays: RelayViews,
    consensus: Arc<ConsensusClient>,
    watcher: Arc<MempoolWatcher>,
    scanner: SharedScanner,
    compositor: SnapshotCompositor,
    probe: HealthProbe,
    tracker: TxTracker,
    sources: SourcesInfo,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Inicia o observador da mempool
    pub fn start(&self) {
        self.watcher.start();
    }

    pub async fn stop(&self) {
        self.watcher.stop().await;
    }

    pub async fn snapshot(&self, limit: usize, include_sandwich: bool, block_tag: &str) -> Result<Bytes> {
        self.compositor.build_snapshot(limit, include_sandwich, block_tag).await
    }

    pub async fn scan_sandwiches(&self, block_tag: &str) -> Result<SandwichReport> {
        self.scanner.scan(block_tag).await
    }

    pub async fn track_tx(&self, hash: &str) -> Result<TxTrack> {
        self.tracker.track(hash).await
    }

    /// Cabeçalhos recentes do consenso com o pagamento do builder do mesmo slot.
    ///
    /// Falha só quando o consenso falha; sem lances os cabeçalhos seguem sem pagamento.
    pub async fn beacon_headers(&self) -> Result<Value> {
        let path = format!("{}?limit={}", PATH_HEADERS, BEACON_HEADERS_LIMIT);
        let beacon = self.consensus.get_json(&path).await?;
        let bids = self.relays.delivered(HEADER_BID_WINDOW).await.unwrap_or_else(|e| {
            debug!(error = %e, "lances indisponíveis; cabeçalhos sem pagamento");
            Vec::new()
        });
        Ok(enrich_headers(&beacon, &bids))
    }

    pub async fn check_health(&self) -> OverallHealth {
        self.probe.check_all().await
    }

    pub async fn readiness(&self) -> bool {
        self.probe.readiness().await
    }

    pub fn liveness(&self) -> bool {
        self.probe.liveness()
    }

    pub fn mempool(&self) -> MempoolSnapshot {
        self.watcher.current_snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Transporte JSON-RPC com registro de saúde
    pub fn rpc(&self) -> &Arc<dyn RpcCaller> {
        &self.rpc
    }

    pub fn relays(&self) -> &RelayViews {
        &self.relays
    }

    pub fn consensus(&self) -> &Arc<ConsensusClient> {
        &self.consensus
    }

    pub fn sources(&self) -> &SourcesInfo {
        &self.sources
    }
}
