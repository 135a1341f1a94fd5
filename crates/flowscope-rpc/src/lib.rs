/*!
 * Flowscope RPC
 *
 * Transportes concretos para os upstreams: JSON-RPC sobre HTTP, GET simples
 * para APIs REST (relays, beacon) e assinatura de pendentes via WebSocket
 */

pub mod ws;

pub use ws::WsPendingFeed;

use async_trait::async_trait;
use flowscope_core::config::RpcConfig;
use flowscope_core::error::Result;
use flowscope_core::traits::{HttpGetter, RpcCaller};
use flowscope_core::utils::sanitize_url;
use flowscope_core::{Error, HttpResponse};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

fn transport_error(context: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::TimeoutError(format!("{}: {}", context, err))
    } else {
        Error::HttpError(format!("{}: {}", context, err))
    }
}

/// Cliente JSON-RPC da camada de execução sobre HTTP
pub struct JsonRpcClient {
    endpoint: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Cria um cliente com o timeout de `config`
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::RpcError(format!("Falha ao criar cliente HTTP: {}", e)))?;
        Ok(Self::with_client(config.http_url.clone(), client))
    }

    /// Reaproveita um `reqwest::Client` existente
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcCaller for JsonRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let req = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(&format!("Falha em {} ({})", method, sanitize_url(&self.endpoint)), e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RpcError(format!("{} respondeu HTTP {}", method, status.as_u16())));
        }

        let body: RpcResponse = resp
            .json()
            .await
            .map_err(|e| Error::DecodeError(format!("Resposta inválida para {}: {}", method, e)))?;

        if let Some(err) = body.error {
            return Err(Error::RpcError(format!("{} (código {})", err.message, err.code)));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

/// GET HTTP usado pelos clientes de relay e de consenso
#[derive(Clone)]
pub struct ReqwestGetter {
    client: Client,
}

impl ReqwestGetter {
    /// Cria um getter cujo timeout vale para cada requisição
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::HttpError(format!("Falha ao criar cliente HTTP: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpGetter for ReqwestGetter {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(&format!("GET {}", sanitize_url(url)), e))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| transport_error("Falha ao ler corpo", e))?;
        Ok(HttpResponse::new(status, body))
    }
}
