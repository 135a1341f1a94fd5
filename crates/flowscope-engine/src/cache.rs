//! Caches em memória com expiração por entrada

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Bytes,
    status: Option<u16>,
    expires_at: Instant,
}

/// Cache chave → (corpo, status) com TTL por entrada.
///
/// Entradas vencidas nunca são devolvidas e são removidas na consulta.
/// Não há limite de tamanho.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Busca `key`; uma entrada vencida é removida e tratada como ausente
    pub fn get(&self, key: &str) -> Option<(Bytes, Option<u16>)> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(e) if now < e.expires_at => return Some((e.body.clone(), e.status)),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // outro escritor pode ter renovado a entrada entre os locks
        if let Some(e) = entries.get(key) {
            if now < e.expires_at {
                return Some((e.body.clone(), e.status));
            }
            entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, body: impl Into<Bytes>, ttl: Duration) {
        self.insert(key.into(), body.into(), None, ttl);
    }

    pub fn set_with_status(
        &self,
        key: impl Into<String>,
        body: impl Into<Bytes>,
        status: u16,
        ttl: Duration,
    ) {
        self.insert(key.into(), body.into(), Some(status), ttl);
    }

    fn insert(&self, key: String, body: Bytes, status: Option<u16>, ttl: Duration) {
        let entry = CacheEntry { body, status, expires_at: Instant::now() + ttl };
        self.entries.write().insert(key, entry);
    }

    /// Número de entradas armazenadas, incluindo vencidas ainda não removidas
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Registro de caminhos que falharam em todas as bases
#[derive(Debug)]
pub struct NegativeCache {
    entries: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl NegativeCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn mark_failed(&self, key: impl Into<String>) {
        self.entries.write().insert(key.into(), Instant::now() + self.ttl);
    }

    /// Indica se `key` falhou há menos de `ttl`
    pub fn recently_failed(&self, key: &str) -> bool {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return false,
                Some(expires_at) if now < *expires_at => return true,
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if let Some(expires_at) = entries.get(key) {
            if now < *expires_at {
                return true;
            }
            entries.remove(key);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
