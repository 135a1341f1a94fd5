/*!
 * Flowscope Engine
 *
 * Motor de agregação resiliente sobre os upstreams de execução, consenso e
 * relays MEV: caches com TTL, failover entre relays, observador da mempool,
 * snapshots compostos sob prazo e detecção heurística de sandwiches
 */

pub mod backoff;
pub mod cache;
pub mod consensus;
pub mod engine;
pub mod failover;
pub mod health;
pub mod mempool;
pub mod probe;
pub mod relay;
pub mod sandwich;
pub mod snapshot;
pub mod sources;
pub mod swaps;
pub mod tracker;

// Re-exportações públicas
pub use cache::{NegativeCache, TtlCache};
pub use consensus::ConsensusClient;
pub use engine::{Engine, EngineBuilder};
pub use failover::FailoverClient;
pub use health::{HealthRegistry, HealthStatus, SourceHealth, TrackedRpc};
pub use mempool::{MempoolWatcher, WatcherMode};
pub use probe::{HealthProbe, OverallHealth, OverallStatus};
pub use relay::RelayViews;
pub use sandwich::{detect_sandwiches, SandwichScanner};
pub use snapshot::SnapshotCompositor;
pub use sources::SourcesInfo;
pub use swaps::SwapExtractor;
pub use tracker::{TxTrack, TxTracker};
