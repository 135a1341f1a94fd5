//! Sondas ativas de saúde e relatório agregado

use crate::consensus::{ConsensusClient, PATH_HEADERS};
use crate::health::{HealthRegistry, HealthStatus};
use crate::mempool::MempoolWatcher;
use crate::failover::FailoverClient;
use crate::relay::delivered_path;
use chrono::{DateTime, Utc};
use flowscope_core::traits::RpcCaller;
use flowscope_core::{MempoolSource, SourceKind};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub data_sources: Vec<HealthStatus>,
    pub summary: HealthSummary,
}

impl OverallHealth {
    pub fn from_statuses(data_sources: Vec<HealthStatus>) -> Self {
        let total = data_sources.len();
        let healthy = data_sources.iter().filter(|s| s.healthy).count();
        let status = if healthy == total {
            OverallStatus::Healthy
        } else if healthy > 0 {
            OverallStatus::Degraded
        } else {
            OverallStatus::Unhealthy
        };
        Self {
            status,
            timestamp: Utc::now(),
            data_sources,
            summary: HealthSummary { total, healthy, unhealthy: total - healthy },
        }
    }
}

/// Executa uma chamada leve em cada upstream e lê o estado resultante
pub struct HealthProbe {
    registry: HealthRegistry,
    consensus: Arc<ConsensusClient>,
    relays: Arc<FailoverClient>,
    rpc: Arc<dyn RpcCaller>,
    watcher: Arc<MempoolWatcher>,
}

impl HealthProbe {
    /// `rpc` deve registrar na saúde rpc do `registry` (ver `TrackedRpc`)
    pub fn new(
        registry: HealthRegistry,
        consensus: Arc<ConsensusClient>,
        relays: Arc<FailoverClient>,
        rpc: Arc<dyn RpcCaller>,
        watcher: Arc<MempoolWatcher>,
    ) -> Self {
        Self { registry, consensus, relays, rpc, watcher }
    }

    pub async fn check_beacon(&self) -> HealthStatus {
        let _ = self.consensus.get(&format!("{}?limit=1", PATH_HEADERS)).await;
        self.registry.get(SourceKind::Beacon).status()
    }

    pub async fn check_relay(&self) -> HealthStatus {
        let _ = self.relays.fetch(&delivered_path(1)).await;
        self.registry.get(SourceKind::Relay).status()
    }

    pub async fn check_rpc(&self) -> HealthStatus {
        let _ = self.rpc.call("eth_blockNumber", Vec::new()).await;
        self.registry.get(SourceKind::Rpc).status()
    }

    /// Saudável se há dados no buffer ou se o monitoramento está desativado
    pub fn check_mempool(&self) -> HealthStatus {
        let snapshot = self.watcher.current_snapshot();
        let healthy = snapshot.count > 0 || snapshot.source == MempoolSource::Disabled;
        let health = self.registry.get(SourceKind::Mempool);
        if healthy {
            health.record_success();
        } else if health.last_error().is_none() {
            health.record_error("sem transações pendentes");
        }
        let mut status = health.status();
        status.healthy = healthy;
        status
    }

    pub async fn check_all(&self) -> OverallHealth {
        let (beacon, relay, rpc) = tokio::join!(self.check_beacon(), self.check_relay(), self.check_rpc());
        let mempool = self.check_mempool();
        OverallHealth::from_statuses(vec![beacon, relay, rpc, mempool])
    }

    /// Pronto quando consenso e execução respondem
    pub async fn readiness(&self) -> bool {
        let (beacon, rpc) = tokio::join!(self.check_beacon(), self.check_rpc());
        beacon.healthy && rpc.healthy
    }

    pub fn liveness(&self) -> bool {
        true
    }
}
