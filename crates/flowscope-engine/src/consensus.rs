//! Cliente da API REST da camada de consenso

use crate::cache::TtlCache;
use crate::health::SourceHealth;
use bytes::Bytes;
use flowscope_core::config::ConsensusConfig;
use flowscope_core::error::Result;
use flowscope_core::traits::HttpGetter;
use flowscope_core::utils::join_url;
use flowscope_core::Error;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const PATH_HEADERS: &str = "/eth/v1/beacon/headers";
pub const PATH_FINALITY: &str = "/eth/v1/beacon/states/finalized/finality_checkpoints";
pub const PATH_GENESIS: &str = "/eth/v1/beacon/genesis";

/// GET em base única; toda resposta fica em cache junto com o status
pub struct ConsensusClient {
    getter: Arc<dyn HttpGetter>,
    base: String,
    cache: TtlCache,
    ok_ttl: Duration,
    error_ttl: Duration,
    health: Arc<SourceHealth>,
}

impl ConsensusClient {
    pub fn new(config: &ConsensusConfig, getter: Arc<dyn HttpGetter>, health: Arc<SourceHealth>) -> Self {
        Self {
            getter,
            base: config.base.clone(),
            cache: TtlCache::new(),
            ok_ttl: config.cache_ttl,
            error_ttl: config.error_ttl,
            health,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn health(&self) -> &Arc<SourceHealth> {
        &self.health
    }

    /// Devolve `(corpo, status)`. Status não-2xx não é erro; só falhas de transporte são.
    pub async fn get(&self, path: &str) -> Result<(Bytes, u16)> {
        if let Some((body, status)) = self.cache.get(path) {
            return Ok((body, status.unwrap_or(200)));
        }

        let url = join_url(&self.base, path);
        let resp = match self.getter.get(&url).await {
            Ok(r) => r,
            Err(e) => {
                self.health.record_error(e.to_string());
                return Err(e);
            }
        };

        if resp.is_success() {
            self.health.record_success();
            self.cache.set_with_status(path, resp.body.clone(), resp.status, self.ok_ttl);
        } else {
            self.health.record_error(format!("HTTP {}", resp.status));
            self.cache.set_with_status(path, resp.body.clone(), resp.status, self.error_ttl);
        }
        Ok((resp.body, resp.status))
    }

    /// Como `get`, mas exige 2xx e decodifica o corpo
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let (body, status) = self.get(path).await?;
        if status / 100 != 2 {
            return Err(Error::HttpError(format!("{} respondeu HTTP {}", path, status)));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
