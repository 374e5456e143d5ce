//! Protocol error taxonomy
//!
//! Every failure in the core is synchronous and surfaced to the caller;
//! there is no automatic retry anywhere in this crate. Retries, if wanted,
//! belong to the transport layer's polling loop.

use shared::bid::{BidAction, BidState};
use thiserror::Error;

use crate::storage::StorageError;
use crate::wallet::WalletError;

/// Errors surfaced by the bid state machine and the escrow engine
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Referenced listing/bid/order/order-item does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A non-BID action arrived with no prior bid on the listing
    #[error("no bid to {action}")]
    BidNotFound { action: BidAction },

    /// Action not legal given the latest bid's state
    #[error("invalid transition: {action} on {state:?} bid")]
    InvalidTransition { action: BidAction, state: BidState },

    /// Order materialization attempted from a non-accepted bid
    #[error("cannot create order from {action} bid")]
    InvalidBidForOrder { action: BidAction },

    /// Required order item objects (`rawtx`, `pubkeys`, `address`) missing
    #[error("insufficient escrow data: missing {missing}")]
    InsufficientEscrowData { missing: &'static str },

    /// Escrow step attempted by the wrong party
    #[error("escrow action {action} not permitted for {party}")]
    WrongParty { action: &'static str, party: &'static str },

    /// Escrow step attempted from the wrong order item status
    #[error("escrow action {action} not permitted while {status}")]
    WrongStatus {
        action: &'static str,
        status: shared::order::OrderStatus,
    },

    /// Wallet rejected the signing request outright
    #[error("transaction signing failed: {0}")]
    TransactionSigningError(String),

    /// A complete signature was required but the wallet produced a partial one
    #[error("signature incomplete where a complete signature was required")]
    IncompleteSignature,

    /// A partial signature was expected but the transaction is fully signed;
    /// guards against broadcasting at the wrong protocol step
    #[error("signature unexpectedly complete")]
    UnexpectedCompleteSignature,

    /// Explicitly unimplemented protocol path (refunds)
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Payload validation failed at a component boundary
    #[error("validation failed: {0}")]
    Validation(String),

    /// Outbound message could not be handed to the transport
    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
