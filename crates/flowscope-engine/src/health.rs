//! Estado de saúde por categoria de upstream

use async_trait::async_trait;
use chrono::Utc;
use flowscope_core::error::Result;
use flowscope_core::traits::RpcCaller;
use flowscope_core::SourceKind;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Janela de recência de sucesso para considerar uma fonte saudável
pub const HEALTH_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct HealthState {
    attempted: bool,
    last_success: Option<Instant>,
    last_success_unix: Option<i64>,
    last_error: Option<String>,
    last_error_unix: Option<i64>,
}

/// Visão serializável de uma fonte
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub name: SourceKind,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<i64>,
}

/// Saúde de uma categoria de upstream
#[derive(Debug)]
pub struct SourceHealth {
    kind: SourceKind,
    window: Duration,
    state: RwLock<HealthState>,
}

impl SourceHealth {
    pub fn new(kind: SourceKind) -> Self {
        Self::with_window(kind, HEALTH_WINDOW)
    }

    pub fn with_window(kind: SourceKind, window: Duration) -> Self {
        Self { kind, window, state: RwLock::new(HealthState::default()) }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Registra sucesso: limpa o último erro
    pub fn record_success(&self) {
        let mut state = self.state.write();
        state.attempted = true;
        state.last_success = Some(Instant::now());
        state.last_success_unix = Some(Utc::now().timestamp());
        state.last_error = None;
        state.last_error_unix = None;
    }

    /// Registra falha: limpa o último sucesso
    pub fn record_error(&self, message: impl Into<String>) {
        let mut state = self.state.write();
        state.attempted = true;
        state.last_success = None;
        state.last_success_unix = None;
        state.last_error = Some(message.into());
        state.last_error_unix = Some(Utc::now().timestamp());
    }

    /// Saudável se nunca houve tentativa ou se o último sucesso está dentro da janela.
    /// Um sucesso limpo por `record_error` conta como fora da janela.
    pub fn is_healthy(&self) -> bool {
        let state = self.state.read();
        if !state.attempted {
            return true;
        }
        match state.last_success {
            Some(at) => at.elapsed() < self.window,
            None => false,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn status(&self) -> HealthStatus {
        let healthy = self.is_healthy();
        let state = self.state.read();
        HealthStatus {
            name: self.kind,
            healthy,
            last_success: state.last_success_unix,
            last_error: state.last_error.clone(),
            last_error_at: state.last_error_unix,
        }
    }
}

/// Uma instância de `SourceHealth` por categoria, compartilhada pelos clientes
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    rpc: Arc<SourceHealth>,
    beacon: Arc<SourceHealth>,
    relay: Arc<SourceHealth>,
    mempool: Arc<SourceHealth>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            rpc: Arc::new(SourceHealth::new(SourceKind::Rpc)),
            beacon: Arc::new(SourceHealth::new(SourceKind::Beacon)),
            relay: Arc::new(SourceHealth::new(SourceKind::Relay)),
            mempool: Arc::new(SourceHealth::new(SourceKind::Mempool)),
        }
    }

    pub fn get(&self, kind: SourceKind) -> Arc<SourceHealth> {
        match kind {
            SourceKind::Rpc => self.rpc.clone(),
            SourceKind::Beacon => self.beacon.clone(),
            SourceKind::Relay => self.relay.clone(),
            SourceKind::Mempool => self.mempool.clone(),
        }
    }

    pub fn statuses(&self) -> Vec<HealthStatus> {
        [&self.rpc, &self.beacon, &self.relay, &self.mempool]
            .iter()
            .map(|h| h.status())
            .collect()
    }
}

/// `RpcCaller` que registra cada chamada na saúde da fonte rpc
pub struct TrackedRpc<R> {
    inner: R,
    health: Arc<SourceHealth>,
}

impl<R: RpcCaller> TrackedRpc<R> {
    pub fn new(inner: R, health: Arc<SourceHealth>) -> Self {
        Self { inner, health }
    }

    pub fn health(&self) -> &Arc<SourceHealth> {
        &self.health
    }
}

#[async_trait]
impl<R: RpcCaller> RpcCaller for TrackedRpc<R> {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        match self.inner.call(method, params).await {
            Ok(v) => {
                self.health.record_success();
                Ok(v)
            }
            Err(e) => {
                self.health.record_error(e.to_string());
                Err(e)
            }
        }
    }
}
