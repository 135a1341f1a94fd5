//! Detecção heurística de sandwiches por pool

use crate::swaps::SwapExtractor;
use ethereum_types::Address;
use flowscope_core::error::Result;
use flowscope_core::traits::RpcCaller;
use flowscope_core::{BlockWithTxs, Sandwich, SandwichReport, SwapEvent};
use std::collections::HashMap;
use tracing::debug;

/// Agrupa por pool (na ordem da primeira aparição) mantendo a ordem dos swaps
fn group_by_pool(swaps: &[SwapEvent]) -> Vec<(Address, Vec<&SwapEvent>)> {
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut groups: Vec<(Address, Vec<&SwapEvent>)> = Vec::new();
    for swap in swaps {
        let slot = *index.entry(swap.pool).or_insert_with(|| {
            groups.push((swap.pool, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(swap);
    }
    groups
}

/// Procura triplas `[A, B, A]` consecutivas em cada pool.
///
/// Após uma tripla, a varredura continua depois dela, então `[A,B,A,B,A]`
/// produz um único sandwich. Swaps sem remetente nunca participam.
pub fn detect_sandwiches(swaps: &[SwapEvent], block: &str) -> Vec<Sandwich> {
    let mut out = Vec::new();
    for (pool, seq) in group_by_pool(swaps) {
        let mut i = 0;
        while i + 2 < seq.len() {
            let (pre, victim, post) = (seq[i], seq[i + 1], seq[i + 2]);
            if let (Some(attacker), Some(victim_from), Some(closer)) = (pre.from, victim.from, post.from) {
                if attacker == closer && attacker != victim_from {
                    out.push(Sandwich {
                        pool,
                        attacker,
                        victim: victim_from,
                        pre_tx: pre.tx_hash,
                        victim_tx: victim.tx_hash,
                        post_tx: post.tx_hash,
                        block: block.to_string(),
                    });
                    i += 3;
                    continue;
                }
            }
            i += 1;
        }
    }
    out
}

/// Bloco → swaps → sandwiches
pub struct SandwichScanner<R> {
    extractor: SwapExtractor<R>,
}

impl<R: RpcCaller> SandwichScanner<R> {
    pub fn new(extractor: SwapExtractor<R>) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &SwapExtractor<R> {
        &self.extractor
    }

    /// Analisa o bloco `block_tag` (`latest`, `0x…`)
    pub async fn scan(&self, block_tag: &str) -> Result<SandwichReport> {
        let block = self.extractor.fetch_block(block_tag).await?;
        self.analyse_block(&block, block_tag).await
    }

    /// Analisa um bloco já obtido; `fallback_label` rotula blocos sem número
    pub async fn analyse_block(&self, block: &BlockWithTxs, fallback_label: &str) -> Result<SandwichReport> {
        let swaps = self.extractor.extract_swaps(block).await?;
        let label = block.number.clone().unwrap_or_else(|| fallback_label.to_string());
        let sandwiches = detect_sandwiches(&swaps, &label);
        debug!(
            block = %label,
            swaps = swaps.len(),
            sandwiches = sandwiches.len(),
            "varredura de sandwiches concluída"
        );
        Ok(SandwichReport {
            block: label,
            block_hash: block.hash.clone().unwrap_or_default(),
            swap_count: swaps.len(),
            sandwiches,
        })
    }
}
