//! Visões tipadas sobre os endpoints de dados dos relays

use crate::failover::FailoverClient;
use flowscope_core::error::Result;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const PATH_DELIVERED: &str = "/relay/v1/data/bidtraces/proposer_payload_delivered";
pub const PATH_RECEIVED: &str = "/relay/v1/data/bidtraces/builder_blocks_received";

/// Limite máximo aceito pelas listagens
pub const MAX_LIMIT: usize = 200;

pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIMIT)
}

pub fn delivered_path(limit: usize) -> String {
    format!("{}?limit={}", PATH_DELIVERED, limit)
}

pub fn received_path(limit: usize) -> String {
    format!("{}?limit={}", PATH_RECEIVED, limit)
}

fn parse_list(body: &[u8]) -> Result<Vec<Value>> {
    Ok(serde_json::from_slice(body)?)
}

fn field(entry: &Value, key: &str) -> Value {
    entry.get(key).cloned().unwrap_or(Value::Null)
}

/// Leituras de payloads entregues e blocos recebidos
#[derive(Clone)]
pub struct RelayViews {
    client: Arc<FailoverClient>,
}

impl RelayViews {
    pub fn new(client: Arc<FailoverClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<FailoverClient> {
        &self.client
    }

    /// Payloads entregues a proponentes, mais recentes primeiro
    pub async fn delivered(&self, limit: usize) -> Result<Vec<Value>> {
        let body = self.client.fetch(&delivered_path(clamp_limit(limit))).await?;
        parse_list(&body)
    }

    /// Blocos submetidos por builders; cai nos entregues se a lista vier vazia ou falhar
    pub async fn received(&self, limit: usize) -> Result<Vec<Value>> {
        let limit = clamp_limit(limit);
        match self.client.fetch(&received_path(limit)).await.and_then(|b| parse_list(&b)) {
            Ok(list) if !list.is_empty() => return Ok(list),
            Ok(_) => debug!("builder_blocks_received vazio; usando entregues"),
            Err(e) => debug!(error = %e, "builder_blocks_received indisponível; usando entregues"),
        }
        self.delivered(limit).await
    }

    /// Visão de cabeçalhos propostos montada a partir dos entregues
    pub async fn headers(&self, limit: usize) -> Result<Value> {
        let limit = clamp_limit(limit);
        let bids = self.delivered(limit).await?;
        Ok(header_view(&bids, limit))
    }
}

/// Monta `{headers, count}` a partir de payloads entregues
pub fn header_view(bids: &[Value], limit: usize) -> Value {
    let headers: Vec<Value> = bids
        .iter()
        .take(limit)
        .map(|bid| {
            json!({
                "slot": field(bid, "slot"),
                "proposer_pubkey": field(bid, "proposer_pubkey"),
                "proposer_index": "",
                "builder_payment_eth": field(bid, "value"),
                "block_number": field(bid, "block_number"),
                "gas_used": field(bid, "gas_used"),
                "gas_limit": field(bid, "gas_limit"),
                "num_tx": field(bid, "num_tx"),
                "builder_pubkey": field(bid, "builder_pubkey"),
                "block_hash": field(bid, "block_hash"),
            })
        })
        .collect();
    let count = headers.len();
    json!({ "headers": headers, "count": count })
}

/// Combina cabeçalhos do consenso (`{data:[{header:{message:{slot,proposer_index}}}]}`)
/// com os lances dos relays do mesmo slot
pub fn enrich_headers(beacon: &Value, bids: &[Value]) -> Value {
    let by_slot: HashMap<&str, &Value> = bids
        .iter()
        .filter_map(|bid| bid.get("slot").and_then(Value::as_str).map(|s| (s, bid)))
        .collect();

    let data = beacon.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
    let headers: Vec<Value> = data
        .iter()
        .map(|h| {
            let message = h.pointer("/header/message").cloned().unwrap_or(Value::Null);
            let slot = message.get("slot").and_then(Value::as_str).unwrap_or_default();

            let mut item = Map::new();
            item.insert("slot".into(), Value::String(slot.to_string()));
            item.insert("proposer_index".into(), field(&message, "proposer_index"));
            if let Some(bid) = by_slot.get(slot) {
                item.insert("builder_payment_eth".into(), field(bid, "value"));
                for key in [
                    "block_number",
                    "gas_used",
                    "gas_limit",
                    "num_tx",
                    "builder_pubkey",
                    "proposer_fee_recipient",
                ] {
                    item.insert(key.into(), field(bid, key));
                }
            }
            Value::Object(item)
        })
        .collect();

    let count = headers.len();
    json!({ "headers": headers, "count": count })
}
