/*!
 * Flowscope Types
 *
 * Tipos comuns usados em toda a workspace Flowscope
 */

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alias para hash de transação
pub type TransactionHash = H256;

/// Categoria de upstream monitorada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rpc,
    Beacon,
    Relay,
    Mempool,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rpc => "rpc",
            SourceKind::Beacon => "beacon",
            SourceKind::Relay => "relay",
            SourceKind::Mempool => "mempool",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Origem dos dados exibidos da mempool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MempoolSource {
    /// Assinatura `newPendingTransactions` via WebSocket
    #[serde(rename = "ws")]
    Push,
    /// Polling periódico do bloco `pending`
    #[serde(rename = "http-polling")]
    Poll,
    /// Monitoramento desativado; dados fictícios de demonstração
    #[serde(rename = "ws-disabled")]
    Disabled,
}

impl MempoolSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MempoolSource::Push => "ws",
            MempoolSource::Poll => "http-polling",
            MempoolSource::Disabled => "ws-disabled",
        }
    }
}

impl fmt::Display for MempoolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resposta HTTP bruta de um upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, body: body.into() }
    }

    /// Status 2xx
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }

    /// Corpo vazio ou só com espaços em branco
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// Transação pendente observada na mempool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTx {
    pub hash: TransactionHash,
    #[serde(default)]
    pub from: Address,
    /// `None` em criação de contrato
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas_price: Option<U256>,
    #[serde(default)]
    pub gas: Option<U256>,
    #[serde(default)]
    pub nonce: U256,
    #[serde(default)]
    pub input: String,
    /// Momento da observação (unix, segundos)
    #[serde(default)]
    pub observed_at: i64,
}

/// Cópia pontual do buffer da mempool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolSnapshot {
    pub pending_txs: Vec<PendingTx>,
    pub count: usize,
    pub last_update: i64,
    pub source: MempoolSource,
}

impl MempoolSnapshot {
    pub fn empty(source: MempoolSource) -> Self {
        Self { pending_txs: Vec::new(), count: 0, last_update: 0, source }
    }

    /// Mantém apenas as `limit` entradas mais recentes
    pub fn truncated(mut self, limit: usize) -> Self {
        self.pending_txs.truncate(limit);
        self.count = self.count.min(limit);
        self
    }
}

/// Bloco com objetos de transação completos (`eth_getBlockByNumber(tag, true)`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWithTxs {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub transactions: Vec<BlockTx>,
}

/// Campos da transação necessários para a varredura de swaps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTx {
    pub hash: TransactionHash,
    #[serde(default)]
    pub from: Option<Address>,
}

/// Recibo de transação reduzido aos logs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    #[serde(default)]
    pub transaction_hash: Option<TransactionHash>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    /// Contrato emissor (o pool, no caso de swaps)
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<H256>,
}

/// Swap encontrado em um bloco, com sua posição
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    pub tx_hash: TransactionHash,
    /// Remetente da transação; ausente quando o node não o informa
    pub from: Option<Address>,
    pub pool: Address,
    pub tx_index: usize,
    pub log_index: usize,
}

impl SwapEvent {
    /// Chave de ordenação dentro do bloco
    pub fn position(&self) -> (usize, usize) {
        (self.tx_index, self.log_index)
    }
}

/// Padrão atacante-vítima-atacante detectado em um pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sandwich {
    pub pool: Address,
    pub attacker: Address,
    pub victim: Address,
    pub pre_tx: TransactionHash,
    pub victim_tx: TransactionHash,
    pub post_tx: TransactionHash,
    pub block: String,
}

/// Resultado da varredura de sandwiches em um bloco
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandwichReport {
    pub block: String,
    pub block_hash: String,
    pub swap_count: usize,
    pub sandwiches: Vec<Sandwich>,
}
