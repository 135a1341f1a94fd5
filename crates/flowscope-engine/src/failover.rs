//! Cliente GET com failover entre bases candidatas

use crate::cache::{NegativeCache, TtlCache};
use crate::health::SourceHealth;
use bytes::Bytes;
use flowscope_core::config::FailoverConfig;
use flowscope_core::error::Result;
use flowscope_core::traits::HttpGetter;
use flowscope_core::utils::{join_url, sanitize_url};
use flowscope_core::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Percorre as bases em ordem até obter um corpo 2xx não vazio.
///
/// O orçamento é verificado antes de cada tentativa; uma requisição em
/// andamento nunca é cancelada por ele.
pub struct FailoverClient {
    getter: Arc<dyn HttpGetter>,
    bases: Vec<String>,
    budget: Duration,
    cache_ttl: Duration,
    cache: Arc<TtlCache>,
    negative: Arc<NegativeCache>,
    health: Arc<SourceHealth>,
}

impl FailoverClient {
    /// Cria o cliente com caches próprios
    pub fn new(config: &FailoverConfig, getter: Arc<dyn HttpGetter>, health: Arc<SourceHealth>) -> Self {
        Self::with_caches(
            config,
            getter,
            health,
            Arc::new(TtlCache::new()),
            Arc::new(NegativeCache::new(config.error_ttl)),
        )
    }

    /// Cria o cliente sobre caches compartilhados
    pub fn with_caches(
        config: &FailoverConfig,
        getter: Arc<dyn HttpGetter>,
        health: Arc<SourceHealth>,
        cache: Arc<TtlCache>,
        negative: Arc<NegativeCache>,
    ) -> Self {
        Self {
            getter,
            bases: config.bases.clone(),
            budget: config.budget,
            cache_ttl: config.cache_ttl,
            cache,
            negative,
            health,
        }
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn health(&self) -> &Arc<SourceHealth> {
        &self.health
    }

    /// Busca `path` (caminho + query) na primeira base que responder
    pub async fn fetch(&self, path: &str) -> Result<Bytes> {
        if self.negative.recently_failed(path) {
            let msg = format!("{}: falhou recentemente; em backoff", path);
            self.health.record_error(msg.clone());
            return Err(Error::BackingOff(msg));
        }

        if let Some((body, _)) = self.cache.get(path) {
            return Ok(body);
        }

        let started = Instant::now();
        let mut attempts = 0usize;
        let mut last_error = String::from("nenhuma base tentada");

        for base in &self.bases {
            if started.elapsed() > self.budget {
                debug!(path, elapsed_ms = started.elapsed().as_millis() as u64, "orçamento de failover esgotado");
                last_error = format!("orçamento esgotado após {} tentativas ({})", attempts, last_error);
                break;
            }
            attempts += 1;

            let url = join_url(base, path);
            match self.getter.get(&url).await {
                Ok(resp) if resp.is_success() && !resp.is_blank() => {
                    self.cache.set(path, resp.body.clone(), self.cache_ttl);
                    self.health.record_success();
                    debug!(path, base = %sanitize_url(base), attempts, "relay respondeu");
                    return Ok(resp.body);
                }
                Ok(resp) if resp.is_success() => {
                    last_error = format!("{}: corpo vazio", sanitize_url(base));
                }
                Ok(resp) => {
                    last_error = format!("{}: HTTP {}", sanitize_url(base), resp.status);
                }
                Err(e) => {
                    last_error = format!("{}: {}", sanitize_url(base), e);
                }
            }
            debug!(path, error = %last_error, "base falhou");
        }

        self.negative.mark_failed(path);
        let msg = format!("todas as {} bases falharam; último erro: {}", self.bases.len(), last_error);
        self.health.record_error(msg.clone());
        warn!(path, attempts, "failover sem sucesso");
        Err(Error::UpstreamUnavailable(msg))
    }
}
