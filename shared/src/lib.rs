//! Shared types for the marketplace protocol node
//!
//! Wire message envelope, bid/order data model and escrow types used by
//! both the daemon and any client-side tooling.

pub mod bid;
pub mod escrow;
pub mod message;
pub mod order;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use bid::{Bid, BidAction, BidData, BidState};
pub use escrow::{Escrow, EscrowRatio, EscrowType};
pub use message::{
    BidMessage, EscrowAction, EscrowData, EscrowMessage, EscrowPhase, MarketplaceAction,
    MarketplaceMessage, MessageObject,
};
pub use order::{Order, OrderItem, OrderItemObject, OrderStatus};
