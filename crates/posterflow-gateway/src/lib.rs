//! HTTP gateway for poster generation.
//!
//! Hosts the stateless `POST /api/poster-gen` ingress endpoint and in-memory
//! poster sessions whose chat turns build up a poster one instruction at a
//! time.

pub mod error;
pub mod handlers;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod sessions;
pub mod state;
pub mod turn;

pub use server::{router, start_gateway};
pub use sessions::{SessionManager, TurnGuard};
pub use state::GatewayState;
pub use turn::{TurnReport, run_turn};
