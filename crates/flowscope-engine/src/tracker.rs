//! Rastreamento de uma transação: execução, inclusão, relay e consenso

use crate::consensus::{ConsensusClient, PATH_FINALITY, PATH_GENESIS};
use crate::relay::RelayViews;
use flowscope_core::error::Result;
use flowscope_core::traits::RpcCaller;
use flowscope_core::utils::parse_hex_u64;
use flowscope_core::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Duração de um slot, em segundos
pub const SECONDS_PER_SLOT: u64 = 12;
pub const SLOTS_PER_EPOCH: u64 = 32;

/// Limite da listagem de entregues consultada para achar o bloco
const RELAY_MATCH_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTx {
    hash: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    transaction_index: Option<String>,
    #[serde(default)]
    gas: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    max_fee_per_gas: Option<String>,
    #[serde(default)]
    max_priority_fee_per_gas: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    #[serde(default)]
    status: String,
    #[serde(default)]
    gas_used: String,
    #[serde(default)]
    effective_gas_price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    miner: String,
    #[serde(default)]
    gas_used: String,
    #[serde(default)]
    gas_limit: String,
    #[serde(default)]
    transactions: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxEconomics {
    pub value: String,
    pub gas_limit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_gas_price: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxStatus {
    pub pending: bool,
    /// Presente quando o recibo foi obtido
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub index: usize,
    pub hash: Value,
    pub from: Value,
    pub to: Value,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inclusion {
    pub block_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_gas_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_gas_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_transactions: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub neighboring_transactions: Vec<Neighbor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayMatch {
    pub builder_pubkey: Value,
    pub proposer_pubkey: Value,
    pub value: Value,
    pub relay: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeaconPosition {
    pub slot: u64,
    pub is_finalized: bool,
    pub finalized_epoch: u64,
}

impl BeaconPosition {
    /// Slot do bloco a partir do gênesis; finalizado se não passa do último slot da época finalizada
    pub fn compute(block_ts: u64, genesis_ts: u64, finalized_epoch: u64) -> Self {
        let slot = block_ts.saturating_sub(genesis_ts) / SECONDS_PER_SLOT;
        let finalized_slot = finalized_epoch
            .saturating_mul(SLOTS_PER_EPOCH)
            .saturating_add(SLOTS_PER_EPOCH - 1);
        Self { slot, is_finalized: slot <= finalized_slot, finalized_epoch }
    }
}

/// Visão consolidada de uma transação
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxTrack {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub economics: TxEconomics,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<Inclusion>,
    pub pbs_relay: Option<RelayMatch>,
    pub beacon: Option<BeaconPosition>,
}

/// Janela de até dois vizinhos de cada lado de `idx`
fn neighbors(transactions: &[Value], idx: usize) -> Vec<Neighbor> {
    let start = idx.saturating_sub(2);
    let end = idx.saturating_add(3).min(transactions.len());
    (start..end)
        .map(|i| {
            let tx = &transactions[i];
            let field = |k: &str| tx.get(k).cloned().unwrap_or(Value::Null);
            Neighbor { index: i, hash: field("hash"), from: field("from"), to: field("to"), value: field("value") }
        })
        .collect()
}

fn same_block(entry: &Value, number: u64) -> bool {
    match entry.get("block_number") {
        Some(Value::String(s)) => s.parse::<u64>().ok() == Some(number),
        Some(Value::Number(n)) => n.as_u64() == Some(number),
        _ => false,
    }
}

fn str_u64(v: &Value, pointer: &str) -> Option<u64> {
    match v.pointer(pointer)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

pub struct TxTracker {
    rpc: Arc<dyn RpcCaller>,
    relays: RelayViews,
    consensus: Arc<ConsensusClient>,
}

impl TxTracker {
    pub fn new(rpc: Arc<dyn RpcCaller>, relays: RelayViews, consensus: Arc<ConsensusClient>) -> Self {
        Self { rpc, relays, consensus }
    }

    async fn call_opt<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Option<T> {
        match self.rpc.call(method, params).await {
            Ok(Value::Null) => None,
            Ok(raw) => match serde_json::from_value(raw) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(method, error = %e, "track: resposta inválida");
                    None
                }
            },
            Err(e) => {
                debug!(method, error = %e, "track: consulta secundária falhou");
                None
            }
        }
    }

    /// Consulta a transação e agrega o que estiver disponível.
    ///
    /// Só a busca da transação é obrigatória; falhas nas demais omitem a seção.
    pub async fn track(&self, hash: &str) -> Result<TxTrack> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(Error::ValidationError("hash da transação é obrigatório".to_string()));
        }

        let raw = self.rpc.call("eth_getTransactionByHash", vec![json!(hash)]).await?;
        if raw.is_null() {
            return Err(Error::NotFound(format!("transação {} não visível neste node", hash)));
        }
        let tx: RawTx = serde_json::from_value(raw)?;

        let pending = tx.block_number.is_none();
        let mut economics = TxEconomics {
            value: tx.value.clone(),
            gas_limit: tx.gas.clone(),
            gas_price: tx.gas_price.clone(),
            max_fee_per_gas: tx.max_fee_per_gas.clone(),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas.clone(),
            ..TxEconomics::default()
        };
        let mut status = TxStatus { pending, success: None };

        if !pending {
            if let Some(receipt) = self
                .call_opt::<RawReceipt>("eth_getTransactionReceipt", vec![json!(tx.hash)])
                .await
            {
                economics.gas_used = Some(receipt.gas_used);
                economics.effective_gas_price = Some(receipt.effective_gas_price);
                status.success = Some(receipt.status == "0x1");
            }
        }

        let mut track = TxTrack {
            hash: tx.hash.clone(),
            from: tx.from.clone(),
            to: tx.to.clone(),
            economics,
            status,
            inclusion: None,
            pbs_relay: None,
            beacon: None,
        };

        if let Some(number) = tx.block_number.clone() {
            let mut inclusion = Inclusion {
                block_number: number.clone(),
                transaction_index: tx.transaction_index.clone(),
                ..Inclusion::default()
            };

            if let Some(block) = self
                .call_opt::<RawBlock>("eth_getBlockByNumber", vec![json!(number), json!(true)])
                .await
            {
                if let Some(idx) = tx.transaction_index.as_deref().and_then(parse_hex_u64) {
                    inclusion.neighboring_transactions = neighbors(&block.transactions, idx as usize);
                }
                inclusion.total_transactions = Some(block.transactions.len());
                inclusion.block_hash = Some(block.hash);
                inclusion.miner = Some(block.miner);
                inclusion.block_gas_used = Some(block.gas_used);
                inclusion.block_gas_limit = Some(block.gas_limit);

                if let Some(n) = parse_hex_u64(&number) {
                    track.pbs_relay = self.relay_match(n).await;
                    if let Some(ts) = parse_hex_u64(&block.timestamp) {
                        track.beacon = self.beacon_position(ts).await;
                    }
                }
                inclusion.timestamp = Some(block.timestamp);
            }
            track.inclusion = Some(inclusion);
        }

        Ok(track)
    }

    async fn relay_match(&self, block_number: u64) -> Option<RelayMatch> {
        let entries = match self.relays.delivered(RELAY_MATCH_LIMIT).await {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "track: relays indisponíveis");
                return None;
            }
        };
        entries.iter().find(|e| same_block(e, block_number)).map(|e| {
            let field = |k: &str| e.get(k).cloned().unwrap_or(Value::Null);
            RelayMatch {
                builder_pubkey: field("builder_pubkey"),
                proposer_pubkey: field("proposer_pubkey"),
                value: field("value"),
                relay: field("relay"),
            }
        })
    }

    async fn beacon_position(&self, block_ts: u64) -> Option<BeaconPosition> {
        let genesis = self.consensus.get_json(PATH_GENESIS).await.ok()?;
        let genesis_ts = str_u64(&genesis, "/data/genesis_time")?;
        let finality = self.consensus.get_json(PATH_FINALITY).await.ok()?;
        let epoch = str_u64(&finality, "/data/finalized/epoch")?;
        Some(BeaconPosition::compute(block_ts, genesis_ts, epoch))
    }
}
