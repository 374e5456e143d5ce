//! Escrow protocol: multisig lock, split and release
//!
//! `engine` holds the state machine, `money` the split arithmetic,
//! `signing` the completeness contract and `projector` the durable
//! status writes.

pub mod engine;
pub mod money;
pub mod projector;
pub mod signing;

pub use engine::{EscrowEngine, EscrowParty};
pub use money::{split_release, truncate_to_decimals, ESCROW_FEE};
pub use projector::OrderStatusProjector;
pub use signing::sign_rawtx;
