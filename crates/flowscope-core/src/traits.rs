/*!
 * Flowscope Traits
 *
 * Pontos de injeção usados em toda a workspace Flowscope
 */

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{HttpResponse, TransactionHash};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Chamador JSON-RPC da camada de execução
#[async_trait]
pub trait RpcCaller: Send + Sync {
    /// Executa `method` e devolve o campo `result` bruto
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

#[async_trait]
impl<T: RpcCaller + ?Sized> RpcCaller for Arc<T> {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        (**self).call(method, params).await
    }
}

/// Primitiva HTTP de requisição/resposta
#[async_trait]
pub trait HttpGetter: Send + Sync {
    /// Faz um GET em `url`. Status não-2xx não é erro aqui; apenas falhas de transporte.
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: HttpGetter + ?Sized> HttpGetter for Arc<T> {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        (**self).get(url).await
    }
}

/// Sessão ativa de notificações de transações pendentes
#[async_trait]
pub trait PendingTxSubscription: Send {
    /// Próximo hash notificado. `Ok(None)` indica que o servidor encerrou a sessão.
    async fn next_hash(&mut self) -> Result<Option<TransactionHash>>;
}

/// Fonte de assinaturas push (`eth_subscribe("newPendingTransactions")`)
#[async_trait]
pub trait PendingTxFeed: Send + Sync {
    /// Abre uma nova sessão; falhas de conexão ou de escrita retornam erro
    async fn subscribe(&self) -> Result<Box<dyn PendingTxSubscription>>;
}

/// Espera injetável, para testar backoff de forma determinística
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Implementação padrão sobre o timer do tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
