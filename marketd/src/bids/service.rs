//! Persistence glue around the bid state machine
//!
//! Reads the latest bid, runs the pure transition, appends the new row and,
//! on `MPA_ACCEPT`, materializes the order — all in a single storage
//! transaction so a mid-step crash never leaves an accepted bid without its
//! order.
//!
//! Note: there is no lock between read-latest and append-new, so two
//! competing actions racing on the same listing can both observe the same
//! "latest" row. Callers serialize per message (sequential inbox draining).

use chrono::Utc;
use serde_json::Value;
use shared::bid::{Bid, BidAction, BidData};
use shared::message::MessageObject;
use tracing::info;
use uuid::Uuid;

use crate::bids::factory::{OrderCreateRequest, OrderFactory};
use crate::bids::state_machine::next_state;
use crate::error::{ProtocolError, ProtocolResult};
use crate::storage::MarketStorage;

/// Convert message objects into bid data rows, rejecting unusable entries
///
/// String values are carried as-is; structured values are JSON-encoded.
pub fn validate_bid_objects(objects: &[MessageObject]) -> ProtocolResult<Vec<BidData>> {
    let mut datas = Vec::with_capacity(objects.len());
    for obj in objects {
        if obj.id.is_empty() {
            return Err(ProtocolError::Validation(
                "bid object with empty id".to_string(),
            ));
        }
        let value = match &obj.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        datas.push(BidData::new(obj.id.clone(), value));
    }
    Ok(datas)
}

/// Bid lifecycle service
pub struct BidService {
    storage: MarketStorage,
}

impl BidService {
    pub fn new(storage: MarketStorage) -> Self {
        Self { storage }
    }

    /// Record an incoming bid-type action against a listing
    ///
    /// `bidder` is the sending party's address, `seller` the listing
    /// owner's. Returns the appended bid row and, for a successful
    /// `MPA_ACCEPT`, the materialized order.
    pub fn record(
        &self,
        listing: &str,
        action: BidAction,
        bidder: &str,
        objects: Option<&[MessageObject]>,
        shipping_address: Option<String>,
        seller: &str,
    ) -> ProtocolResult<(Bid, Option<OrderCreateRequest>)> {
        let latest = self.storage.latest_bid(listing)?;
        next_state(action, latest.as_ref())?;

        // Terminal actions carry no payload; the bid identity (bidder,
        // shipping address) stays with the negotiation round it closes.
        let bid = match action {
            BidAction::MpaBid => Bid {
                id: Uuid::new_v4().to_string(),
                listing_item_hash: listing.to_string(),
                bidder: bidder.to_string(),
                action,
                bid_datas: validate_bid_objects(objects.unwrap_or_default())?,
                shipping_address,
                created_at: Utc::now().timestamp_millis(),
            },
            _ => {
                let origin = latest
                    .as_ref()
                    .ok_or(ProtocolError::BidNotFound { action })?;
                Bid {
                    id: Uuid::new_v4().to_string(),
                    listing_item_hash: listing.to_string(),
                    bidder: origin.bidder.clone(),
                    action,
                    bid_datas: vec![],
                    shipping_address: origin.shipping_address.clone(),
                    created_at: Utc::now().timestamp_millis(),
                }
            }
        };

        let order = if action == BidAction::MpaAccept {
            let origin = latest
                .as_ref()
                .ok_or(ProtocolError::BidNotFound { action })?;
            Some(OrderFactory::create(&bid, origin, seller)?)
        } else {
            None
        };

        let txn = self.storage.begin_write()?;
        let seq = self.storage.append_bid(&txn, &bid)?;
        if let Some(req) = &order {
            self.storage.store_order(&txn, &req.order)?;
            self.storage.store_order_item(&txn, &req.item)?;
            for obj in &req.objects {
                self.storage
                    .put_object(&txn, &req.item.id, &obj.data_id, &obj.data_value)?;
            }
        }
        txn.commit().map_err(crate::storage::StorageError::from)?;

        info!(
            listing,
            %action,
            seq,
            order = order.as_ref().map(|r| r.order.hash.as_str()),
            "recorded bid action"
        );

        Ok((bid, order))
    }
}
