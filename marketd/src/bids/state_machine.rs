//! Bid lifecycle state machine
//!
//! Pure transition function; the caller persists the result as a new row of
//! the listing's append-only bid log. Total over every
//! `(action, latest state)` pair: each input either yields the next state or
//! a well-defined failure.

use shared::bid::{Bid, BidAction, BidState};

use crate::error::{ProtocolError, ProtocolResult};

/// Compute the state a new bid row would record, given the incoming action
/// and the latest bid on the listing
///
/// - `MPA_BID` is always legal, including after a terminal bid: a fresh bid
///   starts a new round of negotiation.
/// - `MPA_ACCEPT` / `MPA_REJECT` / `MPA_CANCEL` require the latest bid to
///   exist and be `Active`.
pub fn next_state(action: BidAction, latest: Option<&Bid>) -> ProtocolResult<BidState> {
    match action {
        BidAction::MpaBid => Ok(BidState::Active),
        BidAction::MpaAccept | BidAction::MpaReject | BidAction::MpaCancel => {
            let latest = latest.ok_or(ProtocolError::BidNotFound { action })?;
            match latest.state() {
                BidState::Active => Ok(BidState::from(action)),
                state => Err(ProtocolError::InvalidTransition { action, state }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid_with(action: BidAction) -> Bid {
        Bid {
            id: "bid-1".to_string(),
            listing_item_hash: "listing-1".to_string(),
            bidder: "addr-buyer".to_string(),
            action,
            bid_datas: vec![],
            shipping_address: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_bid_always_legal() {
        assert_eq!(next_state(BidAction::MpaBid, None).unwrap(), BidState::Active);
        for prior in [
            BidAction::MpaBid,
            BidAction::MpaAccept,
            BidAction::MpaReject,
            BidAction::MpaCancel,
        ] {
            let latest = bid_with(prior);
            assert_eq!(
                next_state(BidAction::MpaBid, Some(&latest)).unwrap(),
                BidState::Active,
                "MPA_BID after {prior} must restart negotiation"
            );
        }
    }

    #[test]
    fn test_terminal_actions_require_active_latest() {
        let active = bid_with(BidAction::MpaBid);
        assert_eq!(
            next_state(BidAction::MpaAccept, Some(&active)).unwrap(),
            BidState::Accepted
        );
        assert_eq!(
            next_state(BidAction::MpaReject, Some(&active)).unwrap(),
            BidState::Rejected
        );
        assert_eq!(
            next_state(BidAction::MpaCancel, Some(&active)).unwrap(),
            BidState::Cancelled
        );
    }

    #[test]
    fn test_terminal_actions_without_latest_fail() {
        for action in [BidAction::MpaAccept, BidAction::MpaReject, BidAction::MpaCancel] {
            assert!(matches!(
                next_state(action, None),
                Err(ProtocolError::BidNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_transition_totality_over_terminal_states() {
        // Every non-BID action on every terminal latest state is rejected
        for prior in [BidAction::MpaAccept, BidAction::MpaReject, BidAction::MpaCancel] {
            let latest = bid_with(prior);
            for action in [BidAction::MpaAccept, BidAction::MpaReject, BidAction::MpaCancel] {
                match next_state(action, Some(&latest)) {
                    Err(ProtocolError::InvalidTransition { state, .. }) => {
                        assert_eq!(state, latest.state());
                    }
                    other => panic!("{action} on {prior} bid: unexpected {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_double_accept_rejected() {
        let accepted = bid_with(BidAction::MpaAccept);
        assert!(matches!(
            next_state(BidAction::MpaAccept, Some(&accepted)),
            Err(ProtocolError::InvalidTransition {
                action: BidAction::MpaAccept,
                state: BidState::Accepted,
            })
        ));
    }
}
