/*!
 * Flowscope Core
 *
 * Tipos, traits e configuração compartilhados para a workspace Flowscope
 */

pub mod types;
pub mod traits;
pub mod utils;
pub mod error;
pub mod config;

// Re-exportações públicas
pub use error::Error;
pub use types::*;
pub use traits::*;
pub use config::*;
