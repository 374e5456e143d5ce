//! Marketplace escrow protocol node
//!
//! Coordinates a peer-to-peer marketplace transaction with no trusted third
//! party: a buyer bids on a listing, the seller accepts, and the parties
//! drive a 2-of-2 multisig escrow (lock → release) by exchanging signed
//! messages and raw blockchain transactions.
//!
//! # Architecture
//!
//! ```text
//! inbound payload → MarketplaceMessage::decode
//!        ↓
//!   MessageProcessor ──(bid actions)──→ BidService → BidStateMachine
//!        │                                   ↓
//!        │                             OrderFactory (on MPA_ACCEPT)
//!        │
//!        └──(escrow actions)──→ EscrowEngine → WalletRpc
//!                                     ↓
//!                             OrderStatusProjector
//!                                     ↓
//!                         MarketStorage (redb) → outbound message
//! ```
//!
//! Messages are drained sequentially: each one is processed to completion
//! (or failure) before the next is handled.

pub mod bids;
pub mod config;
pub mod error;
pub mod escrow;
pub mod processor;
pub mod storage;
pub mod wallet;

// Re-exports
pub use bids::{BidService, OrderFactory};
pub use config::Config;
pub use error::{ProtocolError, ProtocolResult};
pub use escrow::{EscrowEngine, EscrowParty, OrderStatusProjector};
pub use processor::{InProcessTransport, InboundMessage, MessageProcessor, MessageTransport};
pub use storage::{MarketStorage, StorageError};
pub use wallet::{WalletClient, WalletError, WalletRpc};
