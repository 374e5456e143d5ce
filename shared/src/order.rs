//! Order data model
//!
//! An accepted bid is materialized into an `Order` with exactly one
//! `OrderItem` (alpha protocol: one bid, one order, one item). The item's
//! status tracks the escrow protocol, and its object bag carries protocol
//! artifacts between steps.

use serde::{Deserialize, Serialize};

/// Escrow protocol state of an order item
///
/// `AwaitingEscrow → EscrowLocked → { Shipping | Complete }`. Which of the
/// last two applies depends on which side of the trade this node is on:
/// the buyer node moves through `Shipping` before `Complete`, the seller
/// node stays on `EscrowLocked` until the buyer finishes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    AwaitingEscrow,
    EscrowLocked,
    Shipping,
    Complete,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::AwaitingEscrow => write!(f, "AWAITING_ESCROW"),
            OrderStatus::EscrowLocked => write!(f, "ESCROW_LOCKED"),
            OrderStatus::Shipping => write!(f, "SHIPPING"),
            OrderStatus::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// Protocol scratchpad slot on an order item
///
/// At most one live entry per `data_id`; updates overwrite in place.
/// `rawtx` is rewritten at every protocol step and holds either a confirmed
/// transaction id or unsigned/partially-signed transaction hex depending on
/// the phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItemObject {
    pub data_id: String,
    pub data_value: String,
}

/// One item of an order, the unit the escrow protocol operates on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_hash: String,
    /// Bid this item was materialized from
    pub bid_id: String,
    /// Listing item hash
    pub item_hash: String,
    pub status: OrderStatus,
}

/// A materialized order between a buyer and a seller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Content hash of (buyer, seller, sorted item hashes); used for
    /// idempotent lookup and dedup
    pub hash: String,
    pub buyer: String,
    pub seller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    pub item_ids: Vec<String>,
    pub created_at: i64,
}
