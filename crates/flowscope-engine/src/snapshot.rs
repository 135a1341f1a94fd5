//! Compositor de snapshots: leituras paralelas sob prazo suave, resposta inteira em cache

use crate::cache::TtlCache;
use crate::consensus::{ConsensusClient, PATH_FINALITY};
use crate::mempool::MempoolWatcher;
use crate::relay::RelayViews;
use crate::sandwich::SandwichScanner;
use crate::sources::SourcesInfo;
use bytes::Bytes;
use chrono::Utc;
use flowscope_core::config::SnapshotConfig;
use flowscope_core::error::Result;
use flowscope_core::traits::RpcCaller;
use flowscope_core::{Error, MempoolSnapshot};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

pub const PART_RECEIVED: &str = "relays.received";
pub const PART_DELIVERED: &str = "relays.delivered";
pub const PART_HEADERS: &str = "beacon.headers";
pub const PART_FINALITY: &str = "beacon.finality";
pub const PART_MEV: &str = "mev";

/// Scanner usado pela análise embutida
pub type SharedScanner = Arc<SandwichScanner<Arc<dyn RpcCaller>>>;

/// Chave de cache de um snapshot
pub fn cache_key(limit: usize, include_sandwich: bool, block_tag: &str) -> String {
    format!("limit={}|sandwich={}|block={}", limit, include_sandwich, block_tag)
}

#[derive(Debug, Clone, Serialize)]
pub struct Coverage {
    pub requested: usize,
    pub completed: usize,
    pub missing: Vec<&'static str>,
}

#[derive(Serialize)]
struct RelaysSection {
    received: Vec<Value>,
    delivered: Vec<Value>,
}

#[derive(Serialize)]
struct BeaconSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finality: Option<Value>,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    timestamp: i64,
    limit: usize,
    mempool: MempoolSnapshot,
    relays: RelaysSection,
    beacon: BeaconSection,
    sources: &'a SourcesInfo,
    coverage: Coverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    mev: Option<Value>,
}

/// Aguarda `handle` até `deadline`. Se o prazo vencer, o handle é descartado e a
/// tarefa segue desanexada; o resultado é ignorado.
async fn settle<T>(
    handle: JoinHandle<Result<T>>,
    deadline: Instant,
    part: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<T> {
    match timeout_at(deadline, handle).await {
        Ok(Ok(Ok(value))) => Some(value),
        Ok(Ok(Err(e))) => {
            debug!(part, error = %e, "snapshot: parte indisponível");
            missing.push(part);
            None
        }
        Ok(Err(e)) => {
            warn!(part, error = %e, "snapshot: tarefa abortada");
            missing.push(part);
            None
        }
        Err(_) => {
            debug!(part, "snapshot: prazo esgotado");
            missing.push(part);
            None
        }
    }
}

/// Busca o bloco, extrai swaps e detecta sandwiches, limitando o resultado a `limit`
async fn analyse(scanner: SharedScanner, block_tag: String, limit: usize) -> Value {
    let block = match scanner.extractor().fetch_block(&block_tag).await {
        Ok(b) => b,
        Err(e) => {
            debug!(block = %block_tag, error = %e, "mev: falha ao buscar bloco");
            return json!({ "error": "block fetch failed" });
        }
    };
    match scanner.analyse_block(&block, &block_tag).await {
        Ok(mut report) => {
            report.sandwiches.truncate(limit);
            serde_json::to_value(report).unwrap_or_else(|_| json!({ "error": "receipt scan failed" }))
        }
        Err(e) => {
            debug!(block = %block_tag, error = %e, "mev: falha na varredura de recibos");
            json!({ "error": "receipt scan failed" })
        }
    }
}

pub struct SnapshotCompositor {
    relays: RelayViews,
    consensus: Arc<ConsensusClient>,
    watcher: Arc<MempoolWatcher>,
    scanner: SharedScanner,
    sources: SourcesInfo,
    cache: TtlCache,
    config: SnapshotConfig,
}

impl SnapshotCompositor {
    pub fn new(
        config: SnapshotConfig,
        relays: RelayViews,
        consensus: Arc<ConsensusClient>,
        watcher: Arc<MempoolWatcher>,
        scanner: SharedScanner,
        sources: SourcesInfo,
    ) -> Self {
        Self { relays, consensus, watcher, scanner, sources, cache: TtlCache::new(), config }
    }

    /// Limita `limit` a `1..=max_limit`
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.clamp(1, self.config.max_limit.max(1))
    }

    /// Monta (ou devolve do cache) o snapshot serializado.
    ///
    /// `block_tag` vazio equivale a `latest`. Partes que falham ou não chegam
    /// até o prazo ficam vazias e aparecem em `coverage.missing`.
    pub async fn build_snapshot(&self, limit: usize, include_sandwich: bool, block_tag: &str) -> Result<Bytes> {
        let started = Instant::now();
        let limit = self.clamp_limit(limit);
        let block_tag = if block_tag.trim().is_empty() { "latest" } else { block_tag.trim() };

        let key = cache_key(limit, include_sandwich, block_tag);
        if let Some((body, _)) = self.cache.get(&key) {
            if !body.is_empty() {
                debug!(key = %key, "snapshot: cache");
                return Ok(body);
            }
        }

        let views = self.relays.clone();
        let received = tokio::spawn(async move { views.received(limit).await });
        let views = self.relays.clone();
        let delivered = tokio::spawn(async move { views.delivered(limit).await });
        let views = self.relays.clone();
        let headers = tokio::spawn(async move { views.headers(limit).await });
        let consensus = self.consensus.clone();
        let finality = tokio::spawn(async move { consensus.get_json(PATH_FINALITY).await });

        let mev = include_sandwich.then(|| {
            tokio::spawn(analyse(self.scanner.clone(), block_tag.to_string(), limit))
        });

        let deadline = started + self.config.fetch_deadline;
        let mut missing = Vec::new();
        let received = settle(received, deadline, PART_RECEIVED, &mut missing).await;
        let delivered = settle(delivered, deadline, PART_DELIVERED, &mut missing).await;
        let headers = settle(headers, deadline, PART_HEADERS, &mut missing).await;
        let finality = settle(finality, deadline, PART_FINALITY, &mut missing).await;

        let mev = match mev {
            None => None,
            Some(handle) => Some(match timeout_at(started + self.config.mev_timeout, handle).await {
                Ok(Ok(report)) => {
                    if report.get("error").is_some() {
                        missing.push(PART_MEV);
                    }
                    report
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "mev: tarefa abortada");
                    missing.push(PART_MEV);
                    json!({ "error": "mev analysis failed" })
                }
                Err(_) => {
                    missing.push(PART_MEV);
                    json!({ "error": "mev analysis timeout" })
                }
            }),
        };

        let requested = if include_sandwich { 5 } else { 4 };
        let snapshot = Snapshot {
            timestamp: Utc::now().timestamp(),
            limit,
            mempool: self.watcher.current_snapshot().truncated(limit),
            relays: RelaysSection {
                received: received.unwrap_or_default(),
                delivered: delivered.unwrap_or_default(),
            },
            beacon: BeaconSection { headers, finality },
            sources: &self.sources,
            coverage: Coverage { requested, completed: requested - missing.len(), missing },
            mev,
        };

        let body = serde_json::to_vec(&snapshot)
            .map_err(|e| Error::EncodeError(format!("Falha ao serializar snapshot: {}", e)))?;
        let body = Bytes::from(body);
        self.cache.set(key, body.clone(), self.config.ttl);

        info!(
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            missing = snapshot.coverage.missing.len(),
            "snapshot montado"
        );
        Ok(body)
    }
}
