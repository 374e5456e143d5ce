//! Escrow protocol engine
//!
//! Drives the 2-of-2 multisig escrow over an order item:
//!
//! ```text
//! AWAITING_ESCROW --MPA_LOCK (buyer)--> ESCROW_LOCKED
//! ESCROW_LOCKED --MPA_RELEASE (seller half-sign)--> ESCROW_LOCKED
//! ESCROW_LOCKED --inbound seller half (buyer node)--> SHIPPING
//! SHIPPING --MPA_RELEASE (buyer sign + broadcast)--> COMPLETE
//! ```
//!
//! Every step re-derives its inputs from the order item's scratchpad
//! (`rawtx`, `pubkeys`, `address`), so a retry after a mid-step failure
//! starts from the last successfully persisted state. There is no
//! compensating rollback once a signing or broadcast call has been issued.

use rust_decimal::Decimal;
use shared::bid::BidAction;
use shared::escrow::EscrowRatio;
use shared::order::{OrderItem, OrderStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::escrow::money::{split_release, to_decimal, to_f64, ESCROW_FEE};
use crate::escrow::projector::OrderStatusProjector;
use crate::escrow::signing::sign_rawtx;
use crate::storage::MarketStorage;
use crate::wallet::{TxInput, WalletRpc};

/// Which side of the trade this node is on for the given order item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowParty {
    Buyer,
    Seller,
}

impl EscrowParty {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowParty::Buyer => "buyer",
            EscrowParty::Seller => "seller",
        }
    }
}

/// Deterministic wallet label for the escrow of a listing item
fn multisig_label(item_hash: &str) -> String {
    format!("escrow_{item_hash}")
}

pub struct EscrowEngine {
    storage: MarketStorage,
    wallet: Arc<dyn WalletRpc>,
    projector: OrderStatusProjector,
}

impl EscrowEngine {
    pub fn new(storage: MarketStorage, wallet: Arc<dyn WalletRpc>) -> Self {
        let projector = OrderStatusProjector::new(storage.clone());
        Self {
            storage,
            wallet,
            projector,
        }
    }

    fn required_object(&self, item: &OrderItem, key: &'static str) -> ProtocolResult<String> {
        self.storage
            .get_object(&item.id, key)?
            .ok_or(ProtocolError::InsufficientEscrowData { missing: key })
    }

    /// Preconditions shared by all escrow actions: the item's bid must be
    /// accepted and the scratchpad must hold `rawtx` and `pubkeys`
    fn preconditions(&self, item: &OrderItem) -> ProtocolResult<(String, Vec<String>)> {
        let bid = self
            .storage
            .find_bid(&item.item_hash, &item.bid_id)?
            .ok_or_else(|| ProtocolError::NotFound {
                entity: "bid",
                id: item.bid_id.clone(),
            })?;
        if bid.action != BidAction::MpaAccept {
            return Err(ProtocolError::InsufficientEscrowData {
                missing: "accepted bid",
            });
        }

        let rawtx = self.required_object(item, "rawtx")?;
        let pubkeys_raw = self.required_object(item, "pubkeys")?;
        let mut pubkeys: Vec<String> = serde_json::from_str(&pubkeys_raw)
            .map_err(|e| ProtocolError::Validation(format!("pubkeys: {e}")))?;
        // Sorted for a deterministic multisig derivation on both sides
        pubkeys.sort_unstable();
        Ok((rawtx, pubkeys))
    }

    /// MPA_LOCK: the buyer funds the escrow
    ///
    /// Derives the 2-of-2 multisig address, signs the prepared funding
    /// transaction (must come out complete — the buyer holds all its input
    /// keys) and broadcasts it. The resulting txid becomes the new `rawtx`.
    pub async fn lock(
        &self,
        item: &OrderItem,
        party: EscrowParty,
    ) -> ProtocolResult<(OrderItem, String)> {
        let (rawtx, pubkeys) = self.preconditions(item)?;
        if party != EscrowParty::Buyer {
            return Err(ProtocolError::WrongParty {
                action: "MPA_LOCK",
                party: party.as_str(),
            });
        }
        if item.status != OrderStatus::AwaitingEscrow {
            return Err(ProtocolError::WrongStatus {
                action: "MPA_LOCK",
                status: item.status,
            });
        }

        let address = self
            .wallet
            .add_multisig_address(2, &pubkeys, &multisig_label(&item.item_hash))
            .await?;
        debug!(%address, item = %item.item_hash, "derived escrow multisig address");

        let signed = sign_rawtx(self.wallet.as_ref(), &rawtx, true).await?;
        let txid = self.wallet.send_raw_transaction(&signed.hex).await?;

        let updated = self.projector.apply(item, OrderStatus::EscrowLocked, &txid)?;
        Ok((updated, txid))
    }

    /// Inbound MPA_LOCK on the seller node: record the funding txid
    pub fn accept_lock(&self, item: &OrderItem, txid: &str) -> ProtocolResult<OrderItem> {
        if item.status != OrderStatus::AwaitingEscrow {
            return Err(ProtocolError::WrongStatus {
                action: "MPA_LOCK",
                status: item.status,
            });
        }
        self.projector.apply(item, OrderStatus::EscrowLocked, txid)
    }

    /// MPA_RELEASE: role- and status-dependent
    ///
    /// The seller produces the half-signed release first; the buyer
    /// completes and broadcasts it once the item reached `SHIPPING`.
    pub async fn release(
        &self,
        item: &OrderItem,
        party: EscrowParty,
        ratio: &EscrowRatio,
    ) -> ProtocolResult<(OrderItem, String)> {
        let (rawtx, _pubkeys) = self.preconditions(item)?;
        match (party, item.status) {
            (EscrowParty::Seller, OrderStatus::EscrowLocked) => {
                self.release_seller_half(item, &rawtx, ratio).await
            }
            (EscrowParty::Buyer, OrderStatus::Shipping) => {
                self.release_buyer_final(item, &rawtx).await
            }
            (_, status) => Err(ProtocolError::WrongStatus {
                action: "MPA_RELEASE",
                status,
            }),
        }
    }

    /// Seller's first half: build the release transaction from the
    /// confirmed funding output and sign it partially
    ///
    /// `rawtx` holds a confirmed transaction id at this phase. The escrowed
    /// value minus the fee allowance is split per the listing's escrow
    /// ratio; the resulting partially-signed hex replaces `rawtx` and the
    /// status stays `ESCROW_LOCKED` until the buyer counter-releases.
    async fn release_seller_half(
        &self,
        item: &OrderItem,
        txid: &str,
        ratio: &EscrowRatio,
    ) -> ProtocolResult<(OrderItem, String)> {
        let funding_hex = self.wallet.get_raw_transaction(txid).await?;
        let decoded = self.wallet.decode_raw_transaction(&funding_hex).await?;
        let escrowed = decoded
            .vout
            .first()
            .ok_or_else(|| ProtocolError::Validation("funding transaction has no outputs".into()))?
            .value;

        let amount = to_decimal(escrowed) - ESCROW_FEE;
        if amount <= Decimal::ZERO {
            return Err(ProtocolError::Validation(format!(
                "escrowed value {escrowed} does not cover the fee allowance"
            )));
        }
        let (buyer_amount, seller_amount) = split_release(amount, ratio);

        let buyer_address = self.required_object(item, "address")?;
        let seller_change = self
            .wallet
            .get_new_address(&[multisig_label(&item.item_hash)], false)
            .await?;

        let mut outputs = BTreeMap::new();
        outputs.insert(seller_change, to_f64(seller_amount));
        outputs.insert(buyer_address, to_f64(buyer_amount));

        let inputs = [TxInput {
            txid: decoded.txid,
            vout: 0,
        }];
        let unsigned = self.wallet.create_raw_transaction(&inputs, &outputs).await?;
        let signed = sign_rawtx(self.wallet.as_ref(), &unsigned, false).await?;

        let updated = self
            .projector
            .apply(item, OrderStatus::EscrowLocked, &signed.hex)?;
        Ok((updated, signed.hex))
    }

    /// Buyer's second half: complete the signature and broadcast
    async fn release_buyer_final(
        &self,
        item: &OrderItem,
        hex: &str,
    ) -> ProtocolResult<(OrderItem, String)> {
        let signed = sign_rawtx(self.wallet.as_ref(), hex, true).await?;
        let txid = self.wallet.send_raw_transaction(&signed.hex).await?;
        debug!(%txid, item = %item.item_hash, "release transaction broadcast");

        let updated = self.projector.apply(item, OrderStatus::Complete, &signed.hex)?;
        Ok((updated, signed.hex))
    }

    /// Inbound seller release half on the buyer node: store the hex, the
    /// goods are on their way
    pub fn accept_release(&self, item: &OrderItem, rawtx_hex: &str) -> ProtocolResult<OrderItem> {
        if item.status != OrderStatus::EscrowLocked {
            return Err(ProtocolError::WrongStatus {
                action: "MPA_RELEASE",
                status: item.status,
            });
        }
        self.projector.apply(item, OrderStatus::Shipping, rawtx_hex)
    }

    /// Inbound buyer release (fully signed and broadcast) on the seller
    /// node: the trade is done
    pub fn finalize_release(&self, item: &OrderItem, rawtx_hex: &str) -> ProtocolResult<OrderItem> {
        if item.status != OrderStatus::EscrowLocked {
            return Err(ProtocolError::WrongStatus {
                action: "MPA_RELEASE",
                status: item.status,
            });
        }
        self.projector.apply(item, OrderStatus::Complete, rawtx_hex)
    }

    /// MPA_REFUND / MPA_REQUEST_REFUND: not part of this protocol version
    pub fn refund(&self, _item: &OrderItem) -> ProtocolResult<()> {
        Err(ProtocolError::NotImplemented("escrow refund"))
    }
}
