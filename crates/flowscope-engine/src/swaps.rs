//! Extração de eventos `Swap` (Uniswap V2/V3) dos recibos de um bloco

use ethereum_types::H256;
use flowscope_core::config::ScanConfig;
use flowscope_core::error::Result;
use flowscope_core::traits::RpcCaller;
use flowscope_core::utils::{event_topic, format_h256};
use flowscope_core::{BlockTx, BlockWithTxs, Error, SwapEvent, TransactionHash, TxReceipt};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::debug;

/// `Swap(address,uint256,uint256,uint256,uint256,address)`
pub static SWAP_V2_TOPIC: Lazy<H256> =
    Lazy::new(|| event_topic("Swap(address,uint256,uint256,uint256,uint256,address)"));

/// `Swap(address,address,int256,int256,uint160,uint128,int24)`
pub static SWAP_V3_TOPIC: Lazy<H256> =
    Lazy::new(|| event_topic("Swap(address,address,int256,int256,uint160,uint128,int24)"));

pub fn is_swap_topic(topic: &H256) -> bool {
    *topic == *SWAP_V2_TOPIC || *topic == *SWAP_V3_TOPIC
}

/// Swaps de um recibo; `log_index` é a posição do log dentro do recibo
pub fn swaps_in_receipt(tx_index: usize, tx: &BlockTx, receipt: &TxReceipt) -> Vec<SwapEvent> {
    receipt
        .logs
        .iter()
        .enumerate()
        .filter(|(_, log)| log.topics.first().map(is_swap_topic).unwrap_or(false))
        .map(|(log_index, log)| SwapEvent {
            tx_hash: tx.hash,
            from: tx.from,
            pool: log.address,
            tx_index,
            log_index,
        })
        .collect()
}

/// Varre os recibos das primeiras `max_tx` transações de um bloco
pub struct SwapExtractor<R> {
    rpc: R,
    config: ScanConfig,
}

impl<R: RpcCaller> SwapExtractor<R> {
    pub fn new(rpc: R, config: ScanConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// `eth_getBlockByNumber(tag, true)`
    pub async fn fetch_block(&self, tag: &str) -> Result<BlockWithTxs> {
        let raw = self
            .rpc
            .call("eth_getBlockByNumber", vec![json!(tag), json!(true)])
            .await?;
        if raw.is_null() {
            return Err(Error::NotFound(format!("bloco {}", tag)));
        }
        Ok(serde_json::from_value(raw)?)
    }

    async fn receipt(&self, hash: TransactionHash) -> Result<Option<TxReceipt>> {
        let raw = self
            .rpc
            .call("eth_getTransactionReceipt", vec![json!(format_h256(&hash))])
            .await?;
        match raw {
            Value::Null => Ok(None),
            other => Ok(Some(serde_json::from_value(other)?)),
        }
    }

    /// Swaps ordenados por `(tx_index, log_index)`.
    ///
    /// Recibos ausentes, inválidos ou cuja busca falhou são ignorados; a
    /// varredura nunca falha por causa de um recibo.
    pub async fn extract_swaps(&self, block: &BlockWithTxs) -> Result<Vec<SwapEvent>> {
        let scanned: Vec<(usize, BlockTx)> = block
            .transactions
            .iter()
            .take(self.config.max_tx)
            .cloned()
            .enumerate()
            .collect();
        if scanned.is_empty() {
            return Ok(Vec::new());
        }

        let results: Vec<(usize, BlockTx, Result<Option<TxReceipt>>)> = stream::iter(scanned)
            .map(|(idx, tx)| async move {
                let receipt = self.receipt(tx.hash).await;
                (idx, tx, receipt)
            })
            .buffered(self.config.receipt_concurrency.max(1))
            .collect()
            .await;

        let mut skipped = 0usize;
        let mut swaps = Vec::new();
        for (idx, tx, result) in &results {
            match result {
                Ok(Some(receipt)) => swaps.extend(swaps_in_receipt(*idx, tx, receipt)),
                Ok(None) => skipped += 1,
                Err(e) => {
                    skipped += 1;
                    debug!(tx = %format_h256(&tx.hash), error = %e, "recibo ignorado");
                }
            }
        }
        if skipped > 0 {
            debug!(skipped, scanned = results.len(), "recibos ignorados na varredura");
        }

        swaps.sort_by_key(SwapEvent::position);
        Ok(swaps)
    }
}
