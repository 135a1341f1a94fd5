/*!
 * Flowscope Config
 *
 * Valores de configuração já resolvidos. A origem (variáveis de ambiente,
 * arquivo, flags) fica a cargo de quem chama `EngineConfig::from_lookup`.
 */

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// Relays públicos usados quando `RELAY_URLS` não é informado
pub const DEFAULT_RELAYS: &[&str] = &[
    "https://boost-relay.flashbots.net",
    "https://relay.ultrasound.money",
    "https://agnostic-relay.net",
    "https://aestus.live",
    "https://titanrelay.xyz",
    "https://bloxroute.max-profit.blxrbdn.com",
    "https://bloxroute.regulated.blxrbdn.com",
];

/// Relay usado quando a lista configurada fica vazia
pub const FALLBACK_RELAY: &str = "https://boost-relay.flashbots.net";

/// Configuração do cliente JSON-RPC de execução
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub http_url: String,
    /// Endpoint WebSocket; `None` força o modo polling da mempool
    pub ws_url: Option<String>,
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_url: "https://eth-mainnet.g.alchemy.com/v2/demo".to_string(),
            ws_url: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Configuração do cliente de failover dos relays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverConfig {
    /// Bases candidatas, na ordem de tentativa
    pub bases: Vec<String>,
    /// Orçamento global de uma iteração sobre as bases
    pub budget: Duration,
    /// Timeout de cada requisição individual
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub error_ttl: Duration,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            bases: DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            budget: Duration::from_millis(2500),
            request_timeout: Duration::from_secs(3),
            cache_ttl: Duration::from_secs(20),
            error_ttl: Duration::from_secs(10),
        }
    }
}

/// Configuração do cliente da API de consenso (beacon)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusConfig {
    pub base: String,
    pub request_timeout: Duration,
    /// TTL de respostas 2xx
    pub cache_ttl: Duration,
    /// TTL de respostas não-2xx
    pub error_ttl: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            base: "https://beacon.prylabs.net".to_string(),
            request_timeout: Duration::from_secs(3),
            cache_ttl: Duration::from_secs(20),
            error_ttl: Duration::from_secs(10),
        }
    }
}

/// Configuração do observador da mempool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    pub disabled: bool,
    /// Tamanho do buffer circular
    pub capacity: usize,
    pub poll_interval: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    /// Intervalo mínimo entre logs de reconexão
    pub reconnect_log_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            capacity: 10,
            poll_interval: Duration::from_secs(5),
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
            reconnect_log_interval: Duration::from_secs(30),
        }
    }
}

/// Configuração do compositor de snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub ttl: Duration,
    /// Prazo suave para as buscas paralelas
    pub fetch_deadline: Duration,
    /// Prazo da análise de sandwiches embutida
    pub mev_timeout: Duration,
    pub max_limit: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            fetch_deadline: Duration::from_millis(4500),
            mev_timeout: Duration::from_secs(6),
            max_limit: 200,
        }
    }
}

/// Configuração da varredura de swaps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Máximo de transações por bloco cujos recibos são buscados
    pub max_tx: usize,
    pub receipt_concurrency: usize,
}

impl ScanConfig {
    pub const MIN_TX: usize = 10;
    pub const MAX_TX: usize = 1000;

    /// Cria a configuração limitando `max_tx` ao intervalo aceito
    pub fn with_max_tx(max_tx: usize) -> Self {
        Self {
            max_tx: max_tx.clamp(Self::MIN_TX, Self::MAX_TX),
            ..Self::default()
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { max_tx: 120, receipt_concurrency: 4 }
    }
}

/// Configuração completa do motor de agregação
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub rpc: RpcConfig,
    pub relays: FailoverConfig,
    pub consensus: ConsensusConfig,
    pub watcher: WatcherConfig,
    pub snapshot: SnapshotConfig,
    pub scan: ScanConfig,
}

fn bounded<T, F>(lookup: &F, key: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let value = raw.trim().parse::<T>().ok()?;
    if value >= min && value <= max {
        Some(value)
    } else {
        None
    }
}

fn non_empty<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Divide uma lista separada por vírgulas; lista vazia cai no relay padrão
pub fn parse_relay_list(raw: &str) -> Vec<String> {
    let out: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if out.is_empty() {
        vec![FALLBACK_RELAY.to_string()]
    } else {
        out
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl EngineConfig {
    /// Resolve a configuração a partir de uma fonte chave/valor.
    ///
    /// Valores fora do intervalo aceito ou não numéricos são ignorados e o
    /// padrão é mantido.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = EngineConfig::default();

        if let Some(url) = non_empty(&lookup, "RPC_HTTP_URL") {
            cfg.rpc.http_url = url;
        }
        cfg.rpc.ws_url = non_empty(&lookup, "RPC_WS_URL");
        if let Some(secs) = bounded(&lookup, "RPC_TIMEOUT_SECONDS", 1u64, 60) {
            cfg.rpc.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("RELAY_URLS") {
            cfg.relays.bases = parse_relay_list(&raw);
        }
        if let Some(ms) = bounded(&lookup, "RELAY_BUDGET_MS", 101u64, 20_000) {
            cfg.relays.budget = Duration::from_millis(ms);
        }
        if let Some(secs) = bounded(&lookup, "UPSTREAM_TIMEOUT_SECONDS", 1u64, 30) {
            cfg.relays.request_timeout = Duration::from_secs(secs);
            cfg.consensus.request_timeout = Duration::from_secs(secs);
        }
        let cache_ttl = bounded(&lookup, "CACHE_TTL_SECONDS", 1u64, 300);
        if let Some(secs) = cache_ttl {
            cfg.relays.cache_ttl = Duration::from_secs(secs);
            cfg.consensus.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = bounded(&lookup, "ERROR_CACHE_TTL_SECONDS", 1u64, 120) {
            cfg.relays.error_ttl = Duration::from_secs(secs);
            cfg.consensus.error_ttl = Duration::from_secs(secs);
        }

        if let Some(base) = non_empty(&lookup, "BEACON_API_URL") {
            cfg.consensus.base = base;
        }

        // SNAPSHOT_TTL_SECONDS tem precedência; CACHE_TTL_SECONDS é o fallback
        let snapshot_ttl = bounded(&lookup, "SNAPSHOT_TTL_SECONDS", 1u64, 600)
            .or_else(|| bounded(&lookup, "CACHE_TTL_SECONDS", 1u64, 600));
        if let Some(secs) = snapshot_ttl {
            cfg.snapshot.ttl = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("SANDWICH_MAX_TX") {
            if let Ok(n) = raw.trim().parse::<usize>() {
                cfg.scan = ScanConfig::with_max_tx(n);
            }
        }

        cfg.watcher.disabled = lookup("MEMPOOL_DISABLE")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        cfg
    }

    /// Verifica invariantes que a resolução não consegue garantir sozinha
    pub fn validate(&self) -> Result<()> {
        if self.relays.bases.is_empty() {
            return Err(Error::ValidationError("nenhum relay configurado".to_string()));
        }
        if self.rpc.http_url.is_empty() {
            return Err(Error::ValidationError("RPC_HTTP_URL é obrigatório".to_string()));
        }
        if self.consensus.base.is_empty() {
            return Err(Error::ValidationError("BEACON_API_URL é obrigatório".to_string()));
        }
        if self.watcher.capacity == 0 {
            return Err(Error::ValidationError("capacidade da mempool deve ser positiva".to_string()));
        }
        if self.scan.receipt_concurrency == 0 {
            return Err(Error::ValidationError("concorrência de recibos deve ser positiva".to_string()));
        }
        if self.watcher.reconnect_base > self.watcher.reconnect_max {
            return Err(Error::ValidationError(
                "reconnect_base não pode exceder reconnect_max".to_string(),
            ));
        }
        Ok(())
    }
}
