//! Message dispatch and transport
//!
//! The processor is the node's single entry point for protocol traffic.
//! Inbound payloads are decoded, routed to the bid service or the escrow
//! engine based on the action type, and drained strictly sequentially: one
//! message runs to completion (or failure) before the next is looked at.
//! A failed message is logged and skipped; the protocol has no retry queue.
//!
//! Outbound helpers (`submit_bid`, `respond_bid`, `lock_escrow`,
//! `release_escrow`) apply the action locally first and only then hand the
//! encoded envelope to the transport, so the local store never lags behind
//! what the counterparty was told.

use async_trait::async_trait;
use serde_json::Value;
use shared::bid::BidAction;
use shared::escrow::{Escrow, EscrowRatio};
use shared::message::{
    BidMessage, EscrowAction, EscrowData, EscrowMessage, EscrowPhase, MarketplaceAction,
    MarketplaceMessage, MessageObject,
};
use shared::order::OrderItem;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::bids::BidService;
use crate::error::{ProtocolError, ProtocolResult};
use crate::escrow::{EscrowEngine, EscrowParty};
use crate::storage::MarketStorage;
use crate::wallet::WalletRpc;

/// A payload together with the counterparty address it came from
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: String,
    pub payload: String,
}

/// Transport seam between nodes
///
/// `recv` returning `None` means the peer is gone and the drain loop ends.
#[async_trait]
pub trait MessageTransport: Send {
    async fn send(&self, payload: String) -> ProtocolResult<()>;
    async fn recv(&mut self) -> Option<InboundMessage>;
}

/// Channel-backed transport connecting two nodes in the same process
pub struct InProcessTransport {
    address: String,
    tx: mpsc::UnboundedSender<InboundMessage>,
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl InProcessTransport {
    /// Build a connected pair, one end per party address
    pub fn pair(
        left_address: impl Into<String>,
        right_address: impl Into<String>,
    ) -> (InProcessTransport, InProcessTransport) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        (
            InProcessTransport {
                address: left_address.into(),
                tx: right_tx,
                rx: left_rx,
            },
            InProcessTransport {
                address: right_address.into(),
                tx: left_tx,
                rx: right_rx,
            },
        )
    }
}

#[async_trait]
impl MessageTransport for InProcessTransport {
    async fn send(&self, payload: String) -> ProtocolResult<()> {
        self.tx
            .send(InboundMessage {
                from: self.address.clone(),
                payload,
            })
            .map_err(|e| ProtocolError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

/// Pull the shipping address out of the bid objects, if the buyer sent one
fn shipping_from_objects(objects: &[MessageObject]) -> Option<String> {
    objects.iter().find_map(|obj| {
        if obj.id == "shippingAddress" {
            match &obj.value {
                Value::String(s) => Some(s.clone()),
                _ => None,
            }
        } else {
            None
        }
    })
}

/// Per-node protocol dispatcher
pub struct MessageProcessor {
    market: String,
    own_address: String,
    storage: MarketStorage,
    bids: BidService,
    escrow: EscrowEngine,
}

impl MessageProcessor {
    pub fn new(
        market: impl Into<String>,
        own_address: impl Into<String>,
        storage: MarketStorage,
        wallet: Arc<dyn WalletRpc>,
    ) -> Self {
        let bids = BidService::new(storage.clone());
        let escrow = EscrowEngine::new(storage.clone(), wallet);
        Self {
            market: market.into(),
            own_address: own_address.into(),
            storage,
            bids,
            escrow,
        }
    }

    /// Which side of the item's order this node is on
    fn party_for(&self, item: &OrderItem) -> ProtocolResult<EscrowParty> {
        let order = self
            .storage
            .get_order(&item.order_hash)?
            .ok_or_else(|| ProtocolError::NotFound {
                entity: "order",
                id: item.order_hash.clone(),
            })?;
        if order.buyer == self.own_address {
            Ok(EscrowParty::Buyer)
        } else if order.seller == self.own_address {
            Ok(EscrowParty::Seller)
        } else {
            Err(ProtocolError::Validation(format!(
                "{} is not a party to order {}",
                self.own_address, item.order_hash
            )))
        }
    }

    fn order_item(&self, item_hash: &str) -> ProtocolResult<OrderItem> {
        self.storage
            .find_order_item_by_hash(item_hash)?
            .ok_or_else(|| ProtocolError::NotFound {
                entity: "order item",
                id: item_hash.to_string(),
            })
    }

    /// Apply one inbound payload
    ///
    /// Undecodable payloads and foreign-market envelopes are dropped
    /// silently (warn-logged); protocol violations surface as errors.
    pub async fn handle(&self, msg: InboundMessage) -> ProtocolResult<()> {
        let Some(envelope) = MarketplaceMessage::decode(&msg.payload) else {
            return Ok(());
        };
        if envelope.market != self.market {
            warn!(market = %envelope.market, "dropping message for foreign market");
            return Ok(());
        }

        match envelope.mpaction {
            MarketplaceAction::Bid(bid) => self.handle_bid(&msg.from, bid),
            MarketplaceAction::Escrow(escrow) => self.handle_escrow(escrow).await,
        }
    }

    fn handle_bid(&self, from: &str, msg: BidMessage) -> ProtocolResult<()> {
        // An inbound MPA_BID lands on the seller's node; every other bid
        // action is the counterparty reacting to our own bid.
        let seller = match msg.action {
            BidAction::MpaBid => self.own_address.as_str(),
            _ => from,
        };
        let objects = msg.objects.as_deref();
        let shipping = objects.and_then(shipping_from_objects);
        self.bids
            .record(&msg.listing, msg.action, from, objects, shipping, seller)?;
        Ok(())
    }

    async fn handle_escrow(&self, msg: EscrowMessage) -> ProtocolResult<()> {
        let item = self.order_item(&msg.item)?;
        let party = self.party_for(&item)?;

        match msg.action {
            // The buyer locked the escrow; record the funding txid
            EscrowAction::MpaLock => match party {
                EscrowParty::Seller => {
                    self.escrow.accept_lock(&item, &msg.escrow.rawtx)?;
                }
                EscrowParty::Buyer => {
                    return Err(ProtocolError::WrongParty {
                        action: "MPA_LOCK",
                        party: party.as_str(),
                    })
                }
            },
            EscrowAction::MpaRelease => match party {
                // Seller's half-signed release: goods are on their way
                EscrowParty::Buyer => {
                    self.escrow.accept_release(&item, &msg.escrow.rawtx)?;
                }
                // Buyer's completed release: the trade is done
                EscrowParty::Seller => {
                    self.escrow.finalize_release(&item, &msg.escrow.rawtx)?;
                }
            },
            EscrowAction::MpaRefund | EscrowAction::MpaRequestRefund => {
                self.escrow.refund(&item)?;
            }
        }
        Ok(())
    }

    /// Drain the transport until the peer disconnects
    ///
    /// Strictly sequential; a failed message is logged and skipped.
    pub async fn run(&self, transport: &mut dyn MessageTransport) {
        while let Some(msg) = transport.recv().await {
            if let Err(e) = self.handle(msg).await {
                error!(error = %e, "message processing failed");
            }
        }
        info!("transport closed, processor stopping");
    }

    /// Place a bid on a listing and produce the envelope to send
    pub fn submit_bid(
        &self,
        listing: &str,
        seller: &str,
        objects: Vec<MessageObject>,
    ) -> ProtocolResult<MarketplaceMessage> {
        let shipping = shipping_from_objects(&objects);
        self.bids.record(
            listing,
            BidAction::MpaBid,
            &self.own_address,
            Some(&objects),
            shipping,
            seller,
        )?;
        Ok(MarketplaceMessage::new(
            self.market.clone(),
            MarketplaceAction::Bid(BidMessage {
                action: BidAction::MpaBid,
                listing: listing.to_string(),
                objects: Some(objects),
            }),
        ))
    }

    /// Accept, reject or cancel the active bid on a listing
    pub fn respond_bid(
        &self,
        listing: &str,
        action: BidAction,
    ) -> ProtocolResult<MarketplaceMessage> {
        if action == BidAction::MpaBid {
            return Err(ProtocolError::Validation(
                "respond_bid does not place bids".to_string(),
            ));
        }
        self.bids.record(
            listing,
            action,
            &self.own_address,
            None,
            None,
            &self.own_address,
        )?;
        Ok(MarketplaceMessage::new(
            self.market.clone(),
            MarketplaceAction::Bid(BidMessage {
                action,
                listing: listing.to_string(),
                objects: None,
            }),
        ))
    }

    /// Fund the escrow (buyer) and produce the lock envelope
    pub async fn lock_escrow(&self, item_hash: &str) -> ProtocolResult<MarketplaceMessage> {
        let item = self.order_item(item_hash)?;
        let party = self.party_for(&item)?;
        let (_, txid) = self.escrow.lock(&item, party).await?;
        Ok(MarketplaceMessage::new(
            self.market.clone(),
            MarketplaceAction::Escrow(EscrowMessage {
                action: EscrowAction::MpaLock,
                item: item_hash.to_string(),
                nonce: None,
                memo: None,
                info: None,
                accepted: None,
                escrow: EscrowData {
                    phase: EscrowPhase::Lock,
                    rawtx: txid,
                },
            }),
        ))
    }

    /// Escrow terms for the item, seeded from the bid's `escrow` object
    ///
    /// Listings without explicit terms fall back to the default ratio.
    fn escrow_ratio(&self, item: &OrderItem) -> ProtocolResult<EscrowRatio> {
        match self.storage.get_object(&item.id, "escrow")? {
            Some(raw) => {
                let escrow: Escrow = serde_json::from_str(&raw)
                    .map_err(|e| ProtocolError::Validation(format!("escrow terms: {e}")))?;
                Ok(escrow.ratio)
            }
            None => Ok(EscrowRatio::default()),
        }
    }

    /// Advance the release (seller half-sign or buyer completion) and
    /// produce the release envelope
    pub async fn release_escrow(&self, item_hash: &str) -> ProtocolResult<MarketplaceMessage> {
        let item = self.order_item(item_hash)?;
        let party = self.party_for(&item)?;
        let ratio = self.escrow_ratio(&item)?;
        let (_, rawtx) = self.escrow.release(&item, party, &ratio).await?;
        Ok(MarketplaceMessage::new(
            self.market.clone(),
            MarketplaceAction::Escrow(EscrowMessage {
                action: EscrowAction::MpaRelease,
                item: item_hash.to_string(),
                nonce: None,
                memo: None,
                info: None,
                accepted: None,
                escrow: EscrowData {
                    phase: EscrowPhase::Release,
                    rawtx,
                },
            }),
        ))
    }
}
