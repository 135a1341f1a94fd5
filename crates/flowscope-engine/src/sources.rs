use flowscope_core::config::EngineConfig;
use flowscope_core::utils::sanitize_url;
use serde::Serialize;

/// Upstreams configurados, sem credenciais
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcesInfo {
    pub rpc_http: String,
    pub rpc_ws: String,
    pub beacon_api: String,
    pub relays: Vec<String>,
}

impl SourcesInfo {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            rpc_http: sanitize_url(&config.rpc.http_url),
            rpc_ws: config.rpc.ws_url.as_deref().map(sanitize_url).unwrap_or_default(),
            beacon_api: sanitize_url(&config.consensus.base),
            relays: config.relays.bases.iter().map(|r| sanitize_url(r)).collect(),
        }
    }
}
