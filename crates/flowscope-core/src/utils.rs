/*!
 * Flowscope Utils
 *
 * Utilitários comuns usados em toda a workspace Flowscope
 */

use ethereum_types::H256;
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};
use url::Url;

/// Converte uma string hexadecimal para H256
pub fn hex_to_h256(hex: &str) -> Option<H256> {
    let hex_str = hex.strip_prefix("0x").unwrap_or(hex);
    H256::from_str(hex_str).ok()
}

/// Converte uma quantidade hexadecimal (`0x1a`) para u64
pub fn parse_hex_u64(hex: &str) -> Option<u64> {
    let hex_str = hex.strip_prefix("0x").unwrap_or(hex);
    u64::from_str_radix(hex_str, 16).ok()
}

/// Formata um H256 para exibição
pub fn format_h256(hash: &H256) -> String {
    format!("0x{:x}", hash)
}

/// Calcula o hash Keccak-256 de dados
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut result = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut result);
    result
}

/// Topic0 de um evento a partir da assinatura canônica, ex.: `Transfer(address,address,uint256)`
pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

/// Concatena uma base de upstream com um caminho, sem barras duplicadas
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Remove credenciais de uma URL para exibição.
///
/// Descarta userinfo, parâmetros de query cujo nome contém `key`, `token` ou
/// `secret`, e chaves embutidas no caminho após `/v2/` ou `/v3/`.
pub fn sanitize_url(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut parsed = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return redact_api_key(raw),
    };

    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            !(k.contains("key") || k.contains("token") || k.contains("secret"))
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = redact_api_key(parsed.path());
    parsed.set_path(&path);

    parsed.to_string()
}

/// Trunca o texto após o primeiro segmento `/v2/` ou `/v3/`
pub fn redact_api_key(s: &str) -> String {
    let cut = ["/v2/", "/v3/"]
        .iter()
        .filter_map(|marker| s.find(marker))
        .min();
    match cut {
        // mantém "/vN" e descarta o restante
        Some(idx) => format!("{}/[REDACTED]", &s[..idx + 3]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniswap_v2_swap_topic() {
        let topic = event_topic("Swap(address,uint256,uint256,uint256,uint256,address)");
        assert_eq!(
            hex::encode(topic.as_bytes()),
            "d78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822"
        );
    }

    #[test]
    fn hex_quantities() {
        assert_eq!(parse_hex_u64("0x1a"), Some(26));
        assert_eq!(parse_hex_u64("ff"), Some(255));
        assert_eq!(parse_hex_u64("0xzz"), None);
    }

    #[test]
    fn sanitize_strips_credentials() {
        assert_eq!(
            sanitize_url("https://eth-mainnet.g.alchemy.com/v2/demo"),
            "https://eth-mainnet.g.alchemy.com/v2/[REDACTED]"
        );
        assert_eq!(
            sanitize_url("https://user:pw@relay.example/data?apikey=abc&limit=2"),
            "https://relay.example/data?limit=2"
        );
        assert_eq!(sanitize_url(""), "");
    }

    #[test]
    fn join_trims_trailing_slash() {
        assert_eq!(join_url("https://relay.example/", "/relay/v1"), "https://relay.example/relay/v1");
    }
}
