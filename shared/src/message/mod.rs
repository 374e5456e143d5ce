//! Marketplace protocol wire messages
//!
//! Every payload travels inside a versioned envelope:
//!
//! ```json
//! { "version": "0.0.1.0", "market": "DEFAULT", "mpaction": { ... } }
//! ```
//!
//! `mpaction` is either a bid-type message (`MPA_BID`, `MPA_ACCEPT`,
//! `MPA_REJECT`, `MPA_CANCEL`) or an escrow-type message (`MPA_LOCK`,
//! `MPA_RELEASE`, `MPA_REFUND`, `MPA_REQUEST_REFUND`).
//!
//! Decoding is a permissive JSON parse with a best-effort contract: a
//! payload that fails to parse is logged and dropped, never retried.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::bid::BidAction;

/// Envelope protocol version
pub const PROTOCOL_VERSION: &str = "0.0.1.0";

/// Escrow-type protocol action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowAction {
    MpaLock,
    MpaRequestRefund,
    MpaRefund,
    MpaRelease,
}

impl std::fmt::Display for EscrowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowAction::MpaLock => write!(f, "MPA_LOCK"),
            EscrowAction::MpaRequestRefund => write!(f, "MPA_REQUEST_REFUND"),
            EscrowAction::MpaRefund => write!(f, "MPA_REFUND"),
            EscrowAction::MpaRelease => write!(f, "MPA_RELEASE"),
        }
    }
}

/// Phase tag carried alongside the raw transaction in an escrow message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EscrowPhase {
    Lock,
    Release,
    Refund,
}

/// Raw transaction payload of an escrow message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowData {
    #[serde(rename = "type")]
    pub phase: EscrowPhase,
    /// Transaction id or (partially signed) transaction hex, phase-dependent
    pub rawtx: String,
}

/// Key/value object attached to a bid message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageObject {
    pub id: String,
    pub value: Value,
}

/// Bid-type protocol payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidMessage {
    pub action: BidAction,
    /// Listing item hash the bid refers to
    pub listing: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<MessageObject>>,
}

/// Escrow-type protocol payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscrowMessage {
    pub action: EscrowAction,
    /// Order item hash the escrow step refers to
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<EscrowInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    pub escrow: EscrowData,
}

/// Free-form info block of an escrow message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EscrowInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Action payload carried by the envelope
///
/// Untagged on the wire: the `action` value of the inner object decides
/// which variant parses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MarketplaceAction {
    Bid(BidMessage),
    Escrow(EscrowMessage),
}

/// Versioned wire envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketplaceMessage {
    pub version: String,
    pub market: String,
    pub mpaction: MarketplaceAction,
}

impl MarketplaceMessage {
    pub fn new(market: impl Into<String>, mpaction: MarketplaceAction) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            market: market.into(),
            mpaction,
        }
    }

    /// Serialize the envelope for transport
    pub fn encode(&self) -> String {
        // The envelope contains only JSON-safe types
        serde_json::to_string(self).expect("envelope serialization cannot fail")
    }

    /// Parse an inbound payload
    ///
    /// Best-effort: a malformed payload is logged at warn level and dropped
    /// by returning `None`. There is no retry path.
    pub fn decode(payload: &str) -> Option<Self> {
        match serde_json::from_str::<MarketplaceMessage>(payload) {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!(error = %e, "dropping malformed marketplace message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bid_message_roundtrip() {
        let msg = MarketplaceMessage::new(
            "DEFAULT",
            MarketplaceAction::Bid(BidMessage {
                action: BidAction::MpaBid,
                listing: "hash-1".to_string(),
                objects: Some(vec![MessageObject {
                    id: "size".to_string(),
                    value: Value::String("XL".to_string()),
                }]),
            }),
        );

        let encoded = msg.encode();
        let decoded = MarketplaceMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_escrow_message_parses_wire_shape() {
        let payload = r#"{
            "version": "0.0.1.0",
            "market": "DEFAULT",
            "mpaction": {
                "action": "MPA_LOCK",
                "item": "item-hash-1",
                "nonce": "n1",
                "escrow": { "type": "lock", "rawtx": "deadbeef" }
            }
        }"#;

        let msg = MarketplaceMessage::decode(payload).unwrap();
        match msg.mpaction {
            MarketplaceAction::Escrow(e) => {
                assert_eq!(e.action, EscrowAction::MpaLock);
                assert_eq!(e.escrow.phase, EscrowPhase::Lock);
                assert_eq!(e.escrow.rawtx, "deadbeef");
                assert_eq!(e.nonce.as_deref(), Some("n1"));
            }
            _ => panic!("expected escrow action"),
        }
    }

    #[test]
    fn test_bid_without_objects_parses() {
        let payload = r#"{
            "version": "0.0.1.0",
            "market": "DEFAULT",
            "mpaction": { "action": "MPA_ACCEPT", "listing": "hash-1" }
        }"#;

        let msg = MarketplaceMessage::decode(payload).unwrap();
        match msg.mpaction {
            MarketplaceAction::Bid(b) => {
                assert_eq!(b.action, BidAction::MpaAccept);
                assert!(b.objects.is_none());
            }
            _ => panic!("expected bid action"),
        }
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        assert!(MarketplaceMessage::decode("not json").is_none());
        assert!(MarketplaceMessage::decode("{}").is_none());
        // Unknown action tag
        let payload = r#"{
            "version": "0.0.1.0",
            "market": "DEFAULT",
            "mpaction": { "action": "MPA_BOGUS", "listing": "x" }
        }"#;
        assert!(MarketplaceMessage::decode(payload).is_none());
    }
}
