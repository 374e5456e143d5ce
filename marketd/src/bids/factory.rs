//! Order materialization from an accepted bid
//!
//! Alpha-protocol constraint: one bid becomes one order with exactly one
//! order item. The order hash is a content hash of the normalized projection
//! `(buyer, seller, sorted item hashes)`, so both parties derive the same
//! hash independently and duplicate materialization is idempotent.

use chrono::Utc;
use sha2::{Digest, Sha256};
use shared::bid::{Bid, BidAction};
use shared::order::{Order, OrderItem, OrderItemObject, OrderStatus};
use uuid::Uuid;

use crate::error::{ProtocolError, ProtocolResult};

/// Everything needed to persist a new order in one write
#[derive(Debug, Clone)]
pub struct OrderCreateRequest {
    pub order: Order,
    pub item: OrderItem,
    /// Protocol artifacts carried over from the bid (pubkeys, outputs, ...)
    pub objects: Vec<OrderItemObject>,
}

/// Deterministic content hash of an order
///
/// Item hashes are sorted before hashing, so the result is independent of
/// the iteration order of the source collection. Fields are length-prefixed
/// to keep the projection unambiguous.
pub fn order_hash(buyer: &str, seller: &str, item_hashes: &[String]) -> String {
    let mut sorted: Vec<&str> = item_hashes.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for field in [buyer, seller].into_iter().chain(sorted) {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Converts accepted bids into orders
pub struct OrderFactory;

impl OrderFactory {
    /// Build an order from an accepted bid
    ///
    /// `origin` is the `MPA_BID` row the acceptance answers: terminal rows
    /// carry no payload, so the protocol artifacts (pubkeys, release
    /// address, ...) are taken from there. `seller` is the listing owner's
    /// address. Fails with [`ProtocolError::InvalidBidForOrder`] for any
    /// action other than `MPA_ACCEPT`.
    pub fn create(bid: &Bid, origin: &Bid, seller: &str) -> ProtocolResult<OrderCreateRequest> {
        if bid.action != BidAction::MpaAccept {
            return Err(ProtocolError::InvalidBidForOrder { action: bid.action });
        }

        let item_hashes = vec![bid.listing_item_hash.clone()];
        let hash = order_hash(&bid.bidder, seller, &item_hashes);
        let item_id = Uuid::new_v4().to_string();

        let item = OrderItem {
            id: item_id.clone(),
            order_hash: hash.clone(),
            bid_id: bid.id.clone(),
            item_hash: bid.listing_item_hash.clone(),
            status: OrderStatus::AwaitingEscrow,
        };

        let order = Order {
            hash,
            buyer: bid.bidder.clone(),
            seller: seller.to_string(),
            shipping_address: bid.shipping_address.clone(),
            item_ids: vec![item_id],
            created_at: Utc::now().timestamp_millis(),
        };

        // Artifacts collected during bidding seed the protocol scratchpad
        let objects = origin
            .bid_datas
            .iter()
            .map(|d| OrderItemObject {
                data_id: d.data_id.clone(),
                data_value: d.data_value.clone(),
            })
            .collect();

        Ok(OrderCreateRequest { order, item, objects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::bid::BidData;

    fn origin_bid() -> Bid {
        Bid {
            id: "bid-1".to_string(),
            listing_item_hash: "item-hash-1".to_string(),
            bidder: "addr-buyer".to_string(),
            action: BidAction::MpaBid,
            bid_datas: vec![
                BidData::new("pubkeys", "[\"03bb\",\"02aa\"]"),
                BidData::new("address", "addr-buyer-release"),
            ],
            shipping_address: Some("1 Main St".to_string()),
            created_at: 0,
        }
    }

    fn accepted_bid() -> Bid {
        Bid {
            id: "bid-2".to_string(),
            listing_item_hash: "item-hash-1".to_string(),
            bidder: "addr-buyer".to_string(),
            action: BidAction::MpaAccept,
            bid_datas: vec![],
            shipping_address: Some("1 Main St".to_string()),
            created_at: 1,
        }
    }

    #[test]
    fn test_order_hash_independent_of_item_order() {
        let a = order_hash(
            "buyer",
            "seller",
            &["h1".to_string(), "h2".to_string(), "h3".to_string()],
        );
        let b = order_hash(
            "buyer",
            "seller",
            &["h3".to_string(), "h1".to_string(), "h2".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_order_hash_sensitive_to_parties() {
        let base = order_hash("buyer", "seller", &["h1".to_string()]);
        assert_ne!(base, order_hash("buyer2", "seller", &["h1".to_string()]));
        assert_ne!(base, order_hash("buyer", "seller2", &["h1".to_string()]));
        // Length prefixing keeps field boundaries unambiguous
        assert_ne!(
            order_hash("ab", "c", &["h1".to_string()]),
            order_hash("a", "bc", &["h1".to_string()])
        );
    }

    #[test]
    fn test_create_from_accepted_bid() {
        let bid = accepted_bid();
        let req = OrderFactory::create(&bid, &origin_bid(), "addr-seller").unwrap();

        assert_eq!(req.order.buyer, "addr-buyer");
        assert_eq!(req.order.seller, "addr-seller");
        assert_eq!(req.order.item_ids, vec![req.item.id.clone()]);
        assert_eq!(req.item.status, OrderStatus::AwaitingEscrow);
        assert_eq!(req.item.bid_id, "bid-2");
        assert_eq!(req.item.item_hash, "item-hash-1");
        assert_eq!(req.objects.len(), 2);
        assert_eq!(req.objects[1].data_id, "address");
    }

    #[test]
    fn test_create_is_hash_stable() {
        let bid = accepted_bid();
        let a = OrderFactory::create(&bid, &origin_bid(), "addr-seller").unwrap();
        let b = OrderFactory::create(&bid, &origin_bid(), "addr-seller").unwrap();
        assert_eq!(a.order.hash, b.order.hash);
    }

    #[test]
    fn test_create_rejects_non_accept() {
        for action in [BidAction::MpaBid, BidAction::MpaReject, BidAction::MpaCancel] {
            let mut bid = accepted_bid();
            bid.action = action;
            assert!(matches!(
                OrderFactory::create(&bid, &origin_bid(), "addr-seller"),
                Err(ProtocolError::InvalidBidForOrder { .. })
            ));
        }
    }
}
