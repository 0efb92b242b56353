//! HTTP node for the proof-of-work ledger: serves the chain, mines blocks and
//! reconciles with peers by the longest-valid-chain rule.

pub mod api;
pub mod config;
mod constants;
pub mod peers;
pub mod state;

pub use api::router;
pub use config::Args;
pub use state::AppState;
