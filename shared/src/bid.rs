//! Bid data model
//!
//! Bids form an append-only negotiation log per listing: a new protocol
//! action is recorded as a new `Bid` row, never as an in-place update.
//! The latest row for a listing determines which actions are legal next.

use serde::{Deserialize, Serialize};

/// Marketplace protocol action carried by a bid-type message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidAction {
    /// Buyer places (or re-places) a bid
    MpaBid,
    /// Seller accepts the latest active bid
    MpaAccept,
    /// Seller rejects the latest active bid
    MpaReject,
    /// Bidder withdraws the latest active bid
    MpaCancel,
}

impl std::fmt::Display for BidAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BidAction::MpaBid => write!(f, "MPA_BID"),
            BidAction::MpaAccept => write!(f, "MPA_ACCEPT"),
            BidAction::MpaReject => write!(f, "MPA_REJECT"),
            BidAction::MpaCancel => write!(f, "MPA_CANCEL"),
        }
    }
}

/// Bid lifecycle state, derived from the recorded action
///
/// `Accepted`, `Rejected` and `Cancelled` are terminal: no further action
/// may be recorded against the listing until a fresh `MPA_BID` restarts the
/// negotiation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidState {
    Active,
    Accepted,
    Rejected,
    Cancelled,
}

impl BidState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BidState::Active)
    }
}

impl From<BidAction> for BidState {
    fn from(action: BidAction) -> Self {
        match action {
            BidAction::MpaBid => BidState::Active,
            BidAction::MpaAccept => BidState::Accepted,
            BidAction::MpaReject => BidState::Rejected,
            BidAction::MpaCancel => BidState::Cancelled,
        }
    }
}

/// Key/value payload attached to a bid (`pubkeys`, `outputs`, `changeAddr`,
/// free-form attributes like `size`, ...)
///
/// Owned exclusively by its bid; created together with it and never mutated
/// independently. Structured values are JSON-encoded into `data_value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidData {
    pub data_id: String,
    pub data_value: String,
}

impl BidData {
    pub fn new(data_id: impl Into<String>, data_value: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
            data_value: data_value.into(),
        }
    }
}

/// One row of the per-listing negotiation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    /// Entity id
    pub id: String,
    /// Listing this bid negotiates for
    pub listing_item_hash: String,
    /// Address of the bidding party
    pub bidder: String,
    /// Recorded protocol action
    pub action: BidAction,
    /// Ordered key/value payload (empty for terminal actions)
    pub bid_datas: Vec<BidData>,
    /// Shipping address supplied with the bid, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Bid {
    /// State this row represents in the negotiation
    pub fn state(&self) -> BidState {
        BidState::from(self.action)
    }

    /// Look up a bid data value by key
    pub fn data(&self, data_id: &str) -> Option<&str> {
        self.bid_datas
            .iter()
            .find(|d| d.data_id == data_id)
            .map(|d| d.data_value.as_str())
    }
}
