//! Bid negotiation
//!
//! - **state_machine**: pure transition function over the per-listing bid log
//! - **factory**: materializes an accepted bid into an order
//! - **service**: persistence glue around the state machine

pub mod factory;
pub mod service;
pub mod state_machine;

pub use factory::{OrderCreateRequest, OrderFactory};
pub use service::BidService;
pub use state_machine::next_state;
