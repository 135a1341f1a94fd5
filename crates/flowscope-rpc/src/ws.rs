//! Assinatura `newPendingTransactions` via WebSocket

use async_trait::async_trait;
use flowscope_core::error::Result;
use flowscope_core::traits::{PendingTxFeed, PendingTxSubscription};
use flowscope_core::utils::{hex_to_h256, sanitize_url};
use flowscope_core::{Error, TransactionHash};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Fonte push sobre um endpoint `ws://` ou `wss://`.
///
/// Protocolo assumido (assinaturas JSON-RPC do Ethereum, estilo geth):
/// - ao conectar, envia `{"jsonrpc":"2.0","id":1,"method":"eth_subscribe","params":["newPendingTransactions"]}`;
/// - a confirmação `{"id":1,"result":"<id da assinatura>"}` é ignorada;
/// - cada notificação chega como `{"method":"eth_subscription","params":{"subscription":..,"result":"0x<hash>"}}`
///   e o `result` é o hash da transação, não o corpo completo;
/// - um objeto `error` em qualquer quadro encerra a sessão com `RpcError`;
/// - `Close` ou fim do stream encerra a sessão sem erro.
#[derive(Debug, Clone)]
pub struct WsPendingFeed {
    url: String,
}

impl WsPendingFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PendingTxFeed for WsPendingFeed {
    async fn subscribe(&self) -> Result<Box<dyn PendingTxSubscription>> {
        let (mut stream, _) = connect_async(self.url.as_str()).await.map_err(|e| {
            Error::RpcError(format!(
                "Falha ao conectar via WebSocket ({}): {}",
                sanitize_url(&self.url),
                e
            ))
        })?;

        let req = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newPendingTransactions"],
        });
        stream
            .send(Message::Text(req.to_string()))
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao enviar eth_subscribe: {}", e)))?;

        debug!(url = %sanitize_url(&self.url), "assinatura de pendentes enviada");
        Ok(Box::new(WsSubscription { stream }))
    }
}

struct WsSubscription {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

/// Interpreta uma mensagem do servidor
fn parse_frame(text: &str) -> Result<Option<TransactionHash>> {
    let value: Value = serde_json::from_str(text)?;
    if let Some(err) = value.get("error") {
        return Err(Error::RpcError(format!("eth_subscribe rejeitado: {}", err)));
    }
    // confirmações (`{"id":1,"result":"0x..."}`) não têm `params`
    Ok(value
        .get("params")
        .and_then(|p| p.get("result"))
        .and_then(Value::as_str)
        .and_then(hex_to_h256))
}

#[async_trait]
impl PendingTxSubscription for WsSubscription {
    async fn next_hash(&mut self) -> Result<Option<TransactionHash>> {
        while let Some(frame) = self.stream.next().await {
            let msg = frame.map_err(|e| Error::RpcError(format!("Falha na leitura do WebSocket: {}", e)))?;
            let parsed = match msg {
                Message::Text(text) => parse_frame(&text)?,
                Message::Binary(bin) => parse_frame(&String::from_utf8_lossy(&bin))?,
                Message::Close(_) => return Ok(None),
                _ => None,
            };
            if let Some(hash) = parsed {
                return Ok(Some(hash));
            }
        }
        Ok(None)
    }
}
