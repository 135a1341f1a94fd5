//! Backoff exponencial de reconexão e limitação de logs

use std::time::Duration;
use tokio::time::Instant;

/// Dobra o atraso atual sem passar de `max`
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    let next_ms = current.as_millis().saturating_mul(2) as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(next_ms.min(max_ms))
}

/// Atraso entre reconexões: `base, 2·base, 4·base, …` até `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.min(max);
        Self { base, max, current: base }
    }

    /// Devolve o atraso a aplicar agora e avança para o próximo
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = next_backoff(self.current, self.max);
        delay
    }

    /// Volta ao atraso base
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

/// Permite no máximo um evento por intervalo
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// `true` se o intervalo já passou desde o último evento permitido
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(at) if now.duration_since(at) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_ceiling() {
        let mut b = Backoff::new(Duration::from_millis(100), Duration::from_millis(500));
        let seq: Vec<u64> = (0..5).map(|_| b.next_delay().as_millis() as u64).collect();
        assert_eq!(seq, vec![100, 200, 400, 500, 500]);
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_allows_one_per_interval() {
        let mut t = LogThrottle::new(Duration::from_secs(30));
        assert!(t.allow());
        assert!(!t.allow());
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!t.allow());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(t.allow());
    }
}
